//! Coarse positioning through IP geolocation.
//!
//! [`IpPositionSource`] asks the ip-api service (through `ipgeolocate`) where
//! an address is. It's the only positioning a headless machine without a
//! GNSS receiver has, so its readings carry a city-level accuracy and will
//! never satisfy a tight threshold on their own.

use crate::error::PositionErrorCode;
use crate::models::{Fix, PositionOptions};
use crate::source::{PositionSource, Subscription};
use async_trait::async_trait;
use ipgeolocate::{Locator, Service};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Nominal uncertainty of an IP lookup, in meters.
pub const IP_ACCURACY_METERS: f64 = 5_000.0;

#[derive(Debug, Clone)]
pub struct IpPositionSource {
    ip: String,
    poll_interval: Duration,
}

impl IpPositionSource {
    pub fn new(ip: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            ip: ip.into(),
            poll_interval,
        }
    }

    async fn lookup(ip: &str) -> Result<Fix, PositionErrorCode> {
        match Locator::get(ip, Service::IpApi).await {
            Ok(loc) => {
                let lat = loc.latitude.parse::<f64>();
                let lon = loc.longitude.parse::<f64>();
                match (lat, lon) {
                    (Ok(lat), Ok(lon)) => {
                        info!("Geolocation successful - ({}, {})", lat, lon);
                        Ok(Fix::new(lat, lon, Some(IP_ACCURACY_METERS)))
                    }
                    _ => {
                        warn!(
                            "Geolocation service returned unparsable coordinates ({}, {})",
                            loc.latitude, loc.longitude
                        );
                        Err(PositionErrorCode::PositionUnavailable)
                    }
                }
            }
            Err(e) => {
                error!("Error using geolocation service: {}", e);
                Err(PositionErrorCode::PositionUnavailable)
            }
        }
    }
}

#[async_trait]
impl PositionSource for IpPositionSource {
    async fn current_position(&self, options: &PositionOptions) -> Result<Fix, PositionErrorCode> {
        match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, Self::lookup(&self.ip))
                .await
                .unwrap_or(Err(PositionErrorCode::Timeout)),
            None => Self::lookup(&self.ip).await,
        }
    }

    fn watch_position(&self, _options: &PositionOptions) -> Subscription {
        let (tx, rx) = mpsc::channel(4);
        let ip = self.ip.clone();
        let interval = self.poll_interval;

        let feeder = tokio::spawn(async move {
            loop {
                let event = Self::lookup(&ip).await;
                if tx.send(event).await.is_err() {
                    return;
                }
                tokio::time::sleep(interval).await;
            }
        });

        Subscription::new(rx, Some(feeder))
    }
}
