//! Open-ended watch that reports every accuracy improvement.
//!
//! Address lookups are debounced through a single pending slot: a newer
//! improvement arriving during the debounce delay replaces the lookup still
//! waiting for the previous one. Once the delay has passed the lookup leaves
//! the slot and always runs to completion.

use crate::error::LocationError;
use crate::locator::Locator;
use crate::models::{accuracy_rank, Fix, LocationReading, PositionOptions};
use crate::source::Subscription;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Why a continuous watch stopped listening to its source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WatchEnd {
    /// The target accuracy was reached. Its update is still delivered.
    TargetReached,
    /// A fatal error ended the session.
    Failed(LocationError),
    /// The source went away without an error.
    SourceClosed,
    /// [`WatchHandle::stop`] was called.
    Stopped,
}

struct WatchState {
    stopped: bool,
    /// Debounced lookup still inside its delay, with its generation.
    pending: Option<(u64, JoinHandle<()>)>,
    generation: u64,
    /// Rank of the last reading passed to `on_update`.
    reported: f64,
    driver: Option<JoinHandle<()>>,
    end: watch::Sender<Option<WatchEnd>>,
}

impl WatchState {
    fn new() -> (Self, watch::Receiver<Option<WatchEnd>>) {
        let (end, ended) = watch::channel(None);
        let state = Self {
            stopped: false,
            pending: None,
            generation: 0,
            reported: f64::INFINITY,
            driver: None,
            end,
        };
        (state, ended)
    }

    /// Records the first end reason; later ones are ignored.
    fn finish(&mut self, reason: WatchEnd) {
        self.end.send_if_modified(|end| {
            if end.is_some() {
                return false;
            }
            *end = Some(reason);
            true
        });
    }
}

/// Handle to a running continuous watch.
///
/// The watch stops on its own only when the target accuracy is reached or a
/// fatal error arrives; [`ended`](WatchHandle::ended) tells which. Otherwise
/// call [`stop`](WatchHandle::stop). Dropping the handle does not stop it.
#[derive(Clone)]
pub struct WatchHandle {
    state: Arc<Mutex<WatchState>>,
    ended: watch::Receiver<Option<WatchEnd>>,
}

fn lock(state: &Mutex<WatchState>) -> MutexGuard<'_, WatchState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl WatchHandle {
    fn new() -> Self {
        let (state, ended) = WatchState::new();
        Self {
            state: Arc::new(Mutex::new(state)),
            ended,
        }
    }

    fn failed(error: LocationError) -> Self {
        let handle = Self::new();
        let mut state = lock(&handle.state);
        state.stopped = true;
        state.finish(WatchEnd::Failed(error));
        drop(state);
        handle
    }

    /// Cancels the subscription and any pending lookup. Once this returns,
    /// `on_update` will not be called again. Safe to call repeatedly.
    ///
    /// Must not be called from inside `on_update`.
    pub fn stop(&self) {
        let mut state = lock(&self.state);
        if state.stopped {
            return;
        }
        state.stopped = true;
        if let Some((_, pending)) = state.pending.take() {
            pending.abort();
        }
        if let Some(driver) = state.driver.take() {
            driver.abort();
        }
        state.finish(WatchEnd::Stopped);
        debug!("Continuous watch stopped");
    }

    /// True once the subscription has been released, whether by
    /// [`stop`](WatchHandle::stop) or by the watch ending on its own.
    pub fn is_stopped(&self) -> bool {
        lock(&self.state).stopped || self.ended.borrow().is_some()
    }

    /// Waits until the watch stops listening to its source.
    pub async fn ended(&self) -> WatchEnd {
        let mut ended = self.ended.clone();
        loop {
            if let Some(reason) = *ended.borrow_and_update() {
                return reason;
            }
            if ended.changed().await.is_err() {
                return WatchEnd::Stopped;
            }
        }
    }
}

impl Locator {
    /// Watches without a deadline and calls `on_update` with the addressed
    /// reading each time accuracy strictly improves. Stops the subscription
    /// by itself once `target_accuracy` meters is reached; the update for
    /// that reading is still delivered.
    pub fn watch_with_continuous_improvement<F>(
        &self,
        on_update: F,
        target_accuracy: f64,
    ) -> WatchHandle
    where
        F: Fn(LocationReading) + Send + Sync + 'static,
    {
        if !self.source.is_available() {
            error!("{}", LocationError::CapabilityUnavailable);
            return WatchHandle::failed(LocationError::CapabilityUnavailable);
        }

        let handle = WatchHandle::new();
        let subscription = self
            .source
            .watch_position(&PositionOptions::precise(None));
        let driver = tokio::spawn(drive(
            self.clone(),
            subscription,
            handle.state.clone(),
            Arc::new(on_update),
            target_accuracy,
        ));

        lock(&handle.state).driver = Some(driver);
        handle
    }
}

/// Waits out the debounce delay, then resolves and reports `fix` unless a
/// newer improvement took the slot in the meantime.
async fn lookup<F>(
    locator: Locator,
    state: Arc<Mutex<WatchState>>,
    on_update: Arc<F>,
    fix: Fix,
    generation: u64,
) where
    F: Fn(LocationReading) + Send + Sync + 'static,
{
    tokio::time::sleep(locator.settings.debounce).await;
    {
        let mut state = lock(&state);
        if state.stopped || state.generation != generation {
            return;
        }
        // Past the delay: leave the slot so later improvements don't abort us.
        state.pending = None;
    }

    let reading = locator.describe(fix).await;
    let rank = accuracy_rank(reading.accuracy);

    let mut state = lock(&state);
    if state.stopped || rank >= state.reported {
        return;
    }
    state.reported = rank;
    on_update(reading);
}

async fn drive<F>(
    locator: Locator,
    mut subscription: Subscription,
    state: Arc<Mutex<WatchState>>,
    on_update: Arc<F>,
    target_accuracy: f64,
) where
    F: Fn(LocationReading) + Send + Sync + 'static,
{
    let mut best = f64::INFINITY;
    let mut reason = WatchEnd::SourceClosed;

    while let Some(event) = subscription.next().await {
        let fix = match event {
            Ok(fix) => fix,
            Err(code) => {
                let error = LocationError::from(code);
                if error.is_fatal() {
                    error!("Continuous watch ended: {}", error);
                    reason = WatchEnd::Failed(error);
                    break;
                }
                warn!("Continuous watch error, still watching: {}", error);
                continue;
            }
        };

        let rank = accuracy_rank(fix.accuracy);
        if rank >= best {
            continue;
        }
        best = rank;
        debug!("Improved to {}m, scheduling lookup", rank);

        {
            let mut slot = lock(&state);
            if slot.stopped {
                return;
            }
            slot.generation += 1;
            let generation = slot.generation;
            let task = tokio::spawn(lookup(
                locator.clone(),
                state.clone(),
                on_update.clone(),
                fix,
                generation,
            ));
            if let Some((_, superseded)) = slot.pending.replace((generation, task)) {
                superseded.abort();
            }
        }

        if rank <= target_accuracy {
            info!("Target accuracy {}m reached, stopping watch", target_accuracy);
            reason = WatchEnd::TargetReached;
            break;
        }
    }

    subscription.cancel();
    lock(&state).finish(reason);
}
