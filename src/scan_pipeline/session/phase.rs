use std::fmt;

/// Position of a session in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Closed,
    Opened,
    ImageOpened,
    Capturing,
    /// The image finished; close it or open the next one.
    Draining,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Opened => "opened",
            Self::ImageOpened => "image-opened",
            Self::Capturing => "capturing",
            Self::Draining => "draining",
        })
    }
}

/// Session operations that are restricted to certain phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    OpenImage,
    CloseImage,
    Start,
    Pump,
    TakeImage,
    CaptureImage,
    GetCapabilities,
    GetSetting,
    PutSetting,
}

impl Operation {
    pub fn permits(self, phase: Phase) -> bool {
        use Phase::*;
        match self {
            Self::OpenImage | Self::CaptureImage => matches!(phase, Opened | Draining),
            Self::CloseImage => matches!(phase, ImageOpened | Capturing | Draining),
            Self::Start => phase == ImageOpened,
            Self::Pump => phase == Capturing,
            Self::TakeImage => phase == Draining,
            Self::GetCapabilities | Self::GetSetting | Self::PutSetting => {
                matches!(phase, Opened | ImageOpened)
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenImage => "open_image",
            Self::CloseImage => "close_image",
            Self::Start => "start",
            Self::Pump => "pump",
            Self::TakeImage => "take_image",
            Self::CaptureImage => "capture_image",
            Self::GetCapabilities => "get_capabilities",
            Self::GetSetting => "get_setting",
            Self::PutSetting => "put_setting",
        })
    }
}
