use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::scan_pipeline::common::error::Result;
use crate::scan_pipeline::device::ScanDevice;
use crate::scan_pipeline::session::{Interrupter, Session};
use crate::scan_pipeline::stream::CapturedImage;

/// What a bridge reports to its subscribers.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    ImageReady(CapturedImage),
    /// The user cancelled on the device or the bridge was shut down. No
    /// further events follow.
    CaptureEnded,
    /// Capture failed; the bridge stopped.
    Failed(String),
}

enum Subscriber {
    Events(Sender<BridgeEvent>),
    Images(Sender<CapturedImage>),
}

#[derive(Clone, Default)]
struct Subscribers(Arc<Mutex<Vec<Subscriber>>>);

impl Subscribers {
    fn add(&self, subscriber: Subscriber) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    /// Sends to every live subscriber and forgets the disconnected ones.
    fn publish(&self, event: BridgeEvent) {
        let mut subscribers = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|subscriber| match (subscriber, &event) {
            (Subscriber::Events(tx), event) => tx.send(event.clone()).is_ok(),
            (Subscriber::Images(tx), BridgeEvent::ImageReady(image)) => {
                tx.send(image.clone()).is_ok()
            }
            (Subscriber::Images(_), _) => true,
        });
    }
}

/// Keeps a session armed on a worker thread and pushes every captured image
/// to subscribers.
///
/// The worker loops open image, start, drain, close image, publish, then
/// arms again. Shutting down interrupts a blocked start and joins the worker,
/// which closes the session.
pub struct NotificationBridge {
    subscribers: Subscribers,
    events: Receiver<BridgeEvent>,
    stop: Arc<AtomicBool>,
    interrupter: Interrupter,
    worker: Option<JoinHandle<()>>,
}

impl NotificationBridge {
    pub fn spawn<D: ScanDevice + 'static>(session: Session<D>) -> Result<Self> {
        let subscribers = Subscribers::default();
        let (tx, events) = crossbeam_channel::unbounded();
        subscribers.add(Subscriber::Events(tx));

        let stop = Arc::new(AtomicBool::new(false));
        let interrupter = session.interrupter();
        let worker = {
            let subscribers = subscribers.clone();
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("scan-bridge".to_owned())
                .spawn(move || run(session, subscribers, stop))?
        };

        Ok(Self {
            subscribers,
            events,
            stop,
            interrupter,
            worker: Some(worker),
        })
    }

    /// Events since the bridge was spawned.
    pub fn events(&self) -> &Receiver<BridgeEvent> {
        &self.events
    }

    /// A new receiver for every event published from now on.
    pub fn subscribe(&self) -> Receiver<BridgeEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.add(Subscriber::Events(tx));
        rx
    }

    /// A new receiver for completed images only.
    pub fn on_image_ready(&self) -> Receiver<CapturedImage> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.add(Subscriber::Images(tx));
        rx
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Stops re-arming, interrupts a blocked start and waits for the worker
    /// to close the session.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        debug!("Shutting down notification bridge");
        self.stop.store(true, Ordering::SeqCst);
        self.interrupter.interrupt();
        if worker.join().is_err() {
            error!("Notification bridge worker panicked");
        }
    }
}

impl Drop for NotificationBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<D: ScanDevice>(mut session: Session<D>, subscribers: Subscribers, stop: Arc<AtomicBool>) {
    info!(device = session.device_name(), "Notification bridge running");
    let mut delivered = 0u64;
    let mut last = BridgeEvent::CaptureEnded;

    while !stop.load(Ordering::SeqCst) {
        match session.capture_image() {
            Ok(image) => {
                delivered += 1;
                debug!(delivered, completion = ?image.completion, "Publishing image");
                subscribers.publish(BridgeEvent::ImageReady(image));
            }
            Err(err) if err.is_cancelled() => {
                info!("Capture ended, not re-arming");
                break;
            }
            Err(err) => {
                error!(error = %err, "Capture failed, not re-arming");
                last = BridgeEvent::Failed(err.to_string());
                break;
            }
        }
    }

    if let Err(err) = session.close() {
        warn!(error = %err, "Closing session after bridge loop failed");
    }
    subscribers.publish(last);
    info!(delivered, "Notification bridge stopped");
}
