//! Tokio front door for platform callbacks.
//!
//! Callback threads push `ScanEvent`s into a bounded channel without blocking;
//! one blocking worker drains it in order and drives the recorder.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::recorder::SignalRecorder;
use crate::scanning::ScanEvent;

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<ScanEvent>,
}

impl EventSender {
    /// Queue an event. Returns false if it was dropped.
    pub fn send(&self, event: ScanEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!("Event queue full, dropping {}", event_kind(&event));
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!("Event loop stopped, dropping {}", event_kind(&event));
                false
            }
        }
    }
}

fn event_kind(event: &ScanEvent) -> &'static str {
    match event {
        ScanEvent::AuthorizationChanged(_) => "authorization change",
        ScanEvent::BeaconsRanged(_) => "ranging batch",
        ScanEvent::LocationsUpdated(_) => "location batch",
    }
}

/// Start the event loop. It ends once every `EventSender` is dropped.
///
/// Must be called from within a tokio runtime.
pub fn spawn_event_loop(
    recorder: Arc<SignalRecorder>,
    capacity: usize,
) -> (EventSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(capacity.max(1));

    let handle = tokio::task::spawn_blocking(move || {
        while let Some(event) = rx.blocking_recv() {
            recorder.handle(event);
        }
        info!("Scan event loop shutting down");
    });

    (EventSender { tx }, handle)
}
