//! Event types and the channel driving a `geofix` session.
//!
//! Location callbacks run on background tasks; they post [`Event`]s into the
//! [`EventHandler`] channel and the main loop in `main.rs` drains it. Ctrl-C
//! is turned into [`Event::Shutdown`] the same way.

use crate::continuous::{WatchEnd, WatchHandle};
use crate::error::LocationError;
use crate::models::LocationReading;
use tokio::sync::mpsc;
use tracing::warn;

/// Events processed by the session loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A reading delivered through an `on_update` callback.
    Reading(LocationReading),
    /// The acquisition finished with this final reading.
    Finished(LocationReading),
    /// The acquisition failed outright.
    Failed(LocationError),
    /// A continuous watch stopped listening to its source.
    WatchEnded(WatchEnd),
    /// The user asked to quit.
    Shutdown,
}

/// Multiplexes location callbacks and Ctrl-C into one stream.
///
/// The sender ([`tx`](EventHandler::tx)) is cloned into whatever produces
/// events; the receiver is consumed by [`next`](EventHandler::next).
pub struct EventHandler {
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Creates the channel without any producers attached.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Creates the channel and spawns a task posting [`Event::Shutdown`] on
    /// Ctrl-C. Must be called inside a tokio runtime.
    pub fn with_ctrl_c() -> Self {
        let handler = Self::new();
        let shutdown_tx = handler.tx.clone();

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    shutdown_tx.send(Event::Shutdown).ok();
                }
                Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
            }
        });

        handler
    }

    /// Receives the next event. `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

/// Posts [`Event::WatchEnded`] once `handle` stops listening to its source.
pub fn forward_watch_end(handle: WatchHandle, tx: mpsc::UnboundedSender<Event>) {
    tokio::spawn(async move {
        let end = handle.ended().await;
        tx.send(Event::WatchEnded(end)).ok();
    });
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
