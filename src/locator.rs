//! Entry points that produce a [`LocationReading`] with an address.
//!
//! [`Locator::get_location_fast`] answers quickly from a single reading.
//! [`Locator::get_location_with_improvement`] answers with that fast reading
//! first and then tries the accuracy-converging watcher for something better.

use crate::config::AccuracyConfig;
use crate::error::LocationError;
use crate::geocode::ReverseGeocoder;
use crate::models::{Fix, LocationReading, Place, PositionOptions};
use crate::source::PositionSource;
use crate::watcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct LocatorSettings {
    pub threshold_meters: f64,
    pub watch_deadline: Duration,
    pub fast_timeout: Duration,
    pub debounce: Duration,
    pub target_meters: f64,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self::from(&AccuracyConfig::default())
    }
}

impl From<&AccuracyConfig> for LocatorSettings {
    fn from(config: &AccuracyConfig) -> Self {
        Self {
            threshold_meters: config.threshold_meters,
            watch_deadline: Duration::from_millis(config.watch_deadline_ms),
            fast_timeout: Duration::from_millis(config.fast_timeout_ms),
            debounce: Duration::from_millis(config.debounce_ms),
            target_meters: config.target_meters,
        }
    }
}

#[derive(Clone)]
pub struct Locator {
    pub(crate) source: Arc<dyn PositionSource>,
    pub(crate) geocoder: Arc<dyn ReverseGeocoder>,
    pub(crate) settings: LocatorSettings,
}

impl Locator {
    pub fn new(
        source: Arc<dyn PositionSource>,
        geocoder: Arc<dyn ReverseGeocoder>,
        settings: LocatorSettings,
    ) -> Self {
        Self {
            source,
            geocoder,
            settings,
        }
    }

    pub fn settings(&self) -> &LocatorSettings {
        &self.settings
    }

    /// Position watcher with the configured threshold and deadline. The
    /// reading carries no address.
    pub async fn await_accurate_position(&self) -> Result<LocationReading, LocationError> {
        watcher::await_accurate_position(
            self.source.as_ref(),
            self.settings.threshold_meters,
            self.settings.watch_deadline,
        )
        .await
    }

    /// One reading, then its address.
    pub async fn get_location_fast(&self) -> Result<LocationReading, LocationError> {
        if !self.source.is_available() {
            return Err(LocationError::CapabilityUnavailable);
        }

        let options = PositionOptions::precise(Some(self.settings.fast_timeout));
        let fix = tokio::time::timeout(
            self.settings.fast_timeout,
            self.source.current_position(&options),
        )
        .await
        .map_err(|_| LocationError::Timeout)??;

        info!(
            "Fast fix ({}, {}) accuracy {:?}m",
            fix.latitude, fix.longitude, fix.accuracy
        );
        Ok(self.describe(fix).await)
    }

    /// Fast reading first, then a background attempt at a better one.
    ///
    /// `on_update` sees the fast reading and, only if the watcher comes back
    /// strictly more accurate, the improved one. The returned reading is
    /// whichever of the two was delivered last. Watcher failures are logged
    /// and otherwise ignored.
    pub async fn get_location_with_improvement<F>(
        &self,
        mut on_update: Option<F>,
    ) -> Result<LocationReading, LocationError>
    where
        F: FnMut(&LocationReading),
    {
        let fast = self.get_location_fast().await?;
        if let Some(callback) = on_update.as_mut() {
            callback(&fast);
        }

        let accurate = match self.await_accurate_position().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Keeping fast reading, improvement failed: {}", e);
                return Ok(fast);
            }
        };

        if !accurate.is_better_than(&fast) {
            info!(
                "Watcher settled at {:?}m, no better than fast {:?}m",
                accurate.accuracy, fast.accuracy
            );
            return Ok(fast);
        }

        let improved = self.describe(accurate.fix()).await;
        if let Some(callback) = on_update.as_mut() {
            callback(&improved);
        }
        Ok(improved)
    }

    /// Same as [`get_location_with_improvement`](Self::get_location_with_improvement)
    /// without a callback.
    pub async fn locate(&self) -> Result<LocationReading, LocationError> {
        self.get_location_with_improvement(None::<fn(&LocationReading)>)
            .await
    }

    /// Accepts `fix` and attaches its address, falling back to the bare
    /// coordinates when the geocoder errors.
    pub(crate) async fn describe(&self, fix: Fix) -> LocationReading {
        let place = match self.geocoder.reverse(fix.latitude, fix.longitude).await {
            Ok(place) => place,
            Err(e) => {
                warn!("Geocoder failed, using raw coordinates: {}", e);
                Place::from_coordinates(fix.latitude, fix.longitude)
            }
        };
        LocationReading::accept(fix).with_place(place)
    }
}
