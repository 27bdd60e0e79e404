//! Test doubles shared by the unit tests.

use crate::error::PositionErrorCode;
use crate::geocode::ReverseGeocoder;
use crate::models::{Fix, Place, PositionOptions};
use crate::replay::{spawn_feeder, ReplayStep};
use crate::source::{PositionEvent, PositionSource, Subscription};
use async_trait::async_trait;
use color_eyre::eyre::eyre;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// A source whose single subscription is fed by hand through the returned
/// sender. `sender.is_closed()` tells whether the subscription was released.
pub struct ChannelSource {
    events: Mutex<Option<mpsc::Receiver<PositionEvent>>>,
}

impl ChannelSource {
    pub fn new() -> (Self, mpsc::Sender<PositionEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let source = Self {
            events: Mutex::new(Some(rx)),
        };
        (source, tx)
    }
}

#[async_trait]
impl PositionSource for ChannelSource {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Fix, PositionErrorCode> {
        Err(PositionErrorCode::PositionUnavailable)
    }

    fn watch_position(&self, _options: &PositionOptions) -> Subscription {
        match self.events.lock().unwrap().take() {
            Some(rx) => Subscription::new(rx, None),
            None => Subscription::closed(),
        }
    }
}

/// Answers `current_position` with a fixed event and plays `watch` steps
/// into every subscription.
pub struct ScriptedSource {
    pub current: PositionEvent,
    pub watch: Vec<ReplayStep>,
}

#[async_trait]
impl PositionSource for ScriptedSource {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Fix, PositionErrorCode> {
        self.current
    }

    fn watch_position(&self, _options: &PositionOptions) -> Subscription {
        spawn_feeder(self.watch.clone())
    }
}

/// An environment without positioning.
#[derive(Default)]
pub struct NoPositioning {
    subscriptions: AtomicUsize,
}

impl NoPositioning {
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PositionSource for NoPositioning {
    fn is_available(&self) -> bool {
        false
    }

    async fn current_position(&self, _options: &PositionOptions) -> Result<Fix, PositionErrorCode> {
        Err(PositionErrorCode::PositionUnavailable)
    }

    fn watch_position(&self, _options: &PositionOptions) -> Subscription {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Subscription::closed()
    }
}

/// Always resolves to the same place and counts lookups.
#[derive(Clone, Default)]
pub struct CountingGeocoder {
    calls: Arc<AtomicUsize>,
}

impl CountingGeocoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for CountingGeocoder {
    async fn reverse(&self, latitude: f64, _longitude: f64) -> color_eyre::Result<Place> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Place {
            address: format!("{} Main Street", latitude),
            place_name: "Main Street".to_string(),
        })
    }
}

pub struct FailingGeocoder;

#[async_trait]
impl ReverseGeocoder for FailingGeocoder {
    async fn reverse(&self, _latitude: f64, _longitude: f64) -> color_eyre::Result<Place> {
        Err(eyre!("geocoder exploded"))
    }
}

/// Takes its time answering. Each lookup uses the next queued delay, or the
/// default once the queue runs dry.
pub struct SlowGeocoder {
    default: Duration,
    delays: Mutex<VecDeque<Duration>>,
}

impl SlowGeocoder {
    pub fn new(delay: Duration) -> Self {
        Self {
            default: delay,
            delays: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_delays(delays: Vec<Duration>) -> Self {
        Self {
            default: Duration::ZERO,
            delays: Mutex::new(delays.into()),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for SlowGeocoder {
    async fn reverse(&self, latitude: f64, _longitude: f64) -> color_eyre::Result<Place> {
        let delay = self
            .delays
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default);
        tokio::time::sleep(delay).await;
        Ok(Place {
            address: format!("{} Slow Lane", latitude),
            place_name: "Slow Lane".to_string(),
        })
    }
}
