//! Accuracy-converging position watcher.
//!
//! Subscribes to continuous readings and settles on the first one within the
//! accuracy threshold. If none gets there before the deadline, the best
//! reading seen so far is returned instead, and only when nothing at all
//! arrived does the watch fail.

use crate::error::LocationError;
use crate::models::{Fix, LocationReading, PositionOptions};
use crate::source::{PositionSource, Subscription};
use std::time::Duration;
use tokio::time::{Instant, Sleep};
use tracing::{debug, info, warn};

/// Bookkeeping for one watch. Owns the subscription and the deadline timer,
/// and releases both in [`WatchSession::settle`], the only exit.
struct WatchSession {
    best: Option<Fix>,
    subscription: Subscription,
    deadline: std::pin::Pin<Box<Sleep>>,
    threshold: f64,
}

/// What a single delivery did to the session.
enum Step {
    Continue,
    Settle(Result<LocationReading, LocationError>),
}

impl WatchSession {
    fn open(source: &dyn PositionSource, threshold: f64, deadline: Duration) -> Self {
        let options = PositionOptions::precise(Some(deadline));
        Self {
            best: None,
            subscription: source.watch_position(&options),
            deadline: Box::pin(tokio::time::sleep_until(Instant::now() + deadline)),
            threshold,
        }
    }

    fn on_fix(&mut self, fix: Fix) -> Step {
        let improved = match &self.best {
            Some(best) => fix.is_better_than(best),
            None => true,
        };
        if improved {
            debug!("New best reading, accuracy {:?}m", fix.accuracy);
            self.best = Some(fix);
        }

        if fix.rank() <= self.threshold {
            info!(
                "Reached {:?}m (threshold {}m)",
                fix.accuracy, self.threshold
            );
            return Step::Settle(Ok(LocationReading::accept(fix)));
        }
        Step::Continue
    }

    fn on_error(&mut self, error: LocationError) -> Step {
        match self.best {
            Some(best) => {
                debug!("Ignoring '{}' after a reading was received", error);
                Step::Settle(Ok(LocationReading::accept(best)))
            }
            None => Step::Settle(Err(error)),
        }
    }

    fn on_source_closed(&mut self) -> Step {
        match self.best {
            Some(best) => Step::Settle(Ok(LocationReading::accept(best))),
            None => Step::Settle(Err(LocationError::PositionUnavailable)),
        }
    }

    fn on_deadline(&mut self) -> Step {
        match self.best {
            Some(best) => {
                info!(
                    "Deadline reached, settling for best accuracy {:?}m",
                    best.accuracy
                );
                Step::Settle(Ok(LocationReading::accept(best)))
            }
            None => {
                warn!("Deadline reached without any reading");
                Step::Settle(Err(LocationError::Timeout))
            }
        }
    }

    /// Tears the session down. Consumes it, so it can only happen once.
    fn settle(
        mut self,
        outcome: Result<LocationReading, LocationError>,
    ) -> Result<LocationReading, LocationError> {
        self.subscription.cancel();
        // Dropping `self.deadline` with the session clears the timer.
        outcome
    }
}

/// Waits for a reading at or below `threshold` meters, giving up after
/// `deadline`.
///
/// # Errors
///
/// * [`LocationError::CapabilityUnavailable`] before subscribing when the
///   source has no positioning at all.
/// * The mapped source error when it arrives before any reading.
/// * [`LocationError::Timeout`] when the deadline passes with no reading.
pub async fn await_accurate_position(
    source: &dyn PositionSource,
    threshold: f64,
    deadline: Duration,
) -> Result<LocationReading, LocationError> {
    if !source.is_available() {
        return Err(LocationError::CapabilityUnavailable);
    }

    let mut session = WatchSession::open(source, threshold, deadline);
    loop {
        let step = tokio::select! {
            biased;
            event = session.subscription.next() => match event {
                Some(Ok(fix)) => session.on_fix(fix),
                Some(Err(code)) => session.on_error(code.into()),
                None => session.on_source_closed(),
            },
            _ = session.deadline.as_mut() => session.on_deadline(),
        };

        if let Step::Settle(outcome) = step {
            return session.settle(outcome);
        }
    }
}
