//! The positioning capability the locators are built on.
//!
//! A [`PositionSource`] offers the two primitives a platform geolocation API
//! exposes: a one-shot reading and a continuous subscription. Subscriptions
//! are owned [`Subscription`] handles; dropping one releases the underlying
//! watch.

use crate::error::PositionErrorCode;
use crate::models::{Fix, PositionOptions};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One delivery from a subscription: a reading or an error code.
pub type PositionEvent = Result<Fix, PositionErrorCode>;

#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Whether positioning exists at all in this environment.
    fn is_available(&self) -> bool {
        true
    }

    /// Requests a single reading.
    async fn current_position(&self, options: &PositionOptions) -> Result<Fix, PositionErrorCode>;

    /// Starts a continuous subscription. Must be called inside a tokio runtime.
    fn watch_position(&self, options: &PositionOptions) -> Subscription;
}

/// An active watch on a positioning source.
///
/// Owns the receiving end of the event channel and, when the source needs
/// one, the task feeding it. [`cancel`](Subscription::cancel) releases both
/// and can be called any number of times.
pub struct Subscription {
    events: mpsc::Receiver<PositionEvent>,
    feeder: Option<JoinHandle<()>>,
    cancelled: bool,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<PositionEvent>, feeder: Option<JoinHandle<()>>) -> Self {
        Self {
            events,
            feeder,
            cancelled: false,
        }
    }

    /// A subscription that never yields anything and is already closed.
    pub fn closed() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        let mut subscription = Self::new(rx, None);
        subscription.cancel();
        subscription
    }

    /// Next event, or `None` once the source has gone away or the
    /// subscription was cancelled.
    pub async fn next(&mut self) -> Option<PositionEvent> {
        if self.cancelled {
            return None;
        }
        self.events.recv().await
    }

    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.events.close();
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
