//! Push-style delivery of captured images

mod bridge;


pub use bridge::{BridgeEvent, NotificationBridge};
