//! Positioning source that plays back a recorded or scripted track.
//!
//! Tracks are CSV files with the header
//! `latitude,longitude,accuracy,delay_ms,error`. Each row waits `delay_ms`
//! after the previous one, then delivers either a fix or, when `error` is
//! set (`permission_denied`, `position_unavailable`, `timeout`, `unknown`),
//! an error code.

use crate::error::PositionErrorCode;
use crate::models::{Fix, PositionOptions};
use crate::source::{PositionEvent, PositionSource, Subscription};
use async_trait::async_trait;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStep {
    pub delay: Duration,
    pub event: PositionEvent,
}

impl ReplayStep {
    pub fn fix(delay_ms: u64, latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            event: Ok(Fix::new(latitude, longitude, accuracy)),
        }
    }

    pub fn error(delay_ms: u64, code: PositionErrorCode) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            event: Err(code),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrackRow {
    latitude: Option<f64>,
    longitude: Option<f64>,
    accuracy: Option<f64>,
    #[serde(default)]
    delay_ms: u64,
    error: Option<PositionErrorCode>,
}

impl TryFrom<TrackRow> for ReplayStep {
    type Error = color_eyre::Report;

    fn try_from(row: TrackRow) -> Result<Self> {
        if let Some(code) = row.error {
            return Ok(ReplayStep::error(row.delay_ms, code));
        }
        match (row.latitude, row.longitude) {
            (Some(lat), Some(lon)) => Ok(ReplayStep::fix(row.delay_ms, lat, lon, row.accuracy)),
            _ => Err(eyre!("track row has neither coordinates nor an error")),
        }
    }
}

pub struct ReplaySource {
    steps: Vec<ReplayStep>,
}

impl ReplaySource {
    pub fn new(steps: Vec<ReplayStep>) -> Self {
        Self { steps }
    }

    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .wrap_err_with(|| format!("Failed to open track '{}'", path.display()))?;
        let source = Self::from_reader(reader)?;
        info!(
            "Loaded {} replay steps from '{}'",
            source.steps.len(),
            path.display()
        );
        Ok(source)
    }

    pub fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let mut steps = Vec::new();
        for (line, row) in reader.deserialize::<TrackRow>().enumerate() {
            let row = row.wrap_err_with(|| format!("Malformed track row {}", line + 1))?;
            let step = ReplayStep::try_from(row)
                .wrap_err_with(|| format!("Invalid track row {}", line + 1))?;
            steps.push(step);
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[ReplayStep] {
        &self.steps
    }
}

/// Spawns a task that plays `steps` into a fresh subscription, then keeps it
/// open (a quiet source) until cancelled.
pub(crate) fn spawn_feeder(steps: Vec<ReplayStep>) -> Subscription {
    let (tx, rx) = mpsc::channel(steps.len().max(1));
    let feeder = tokio::spawn(async move {
        for step in steps {
            tokio::time::sleep(step.delay).await;
            if tx.send(step.event).await.is_err() {
                return;
            }
        }
        debug!("Replay track exhausted, holding subscription open");
        std::future::pending::<()>().await;
    });
    Subscription::new(rx, Some(feeder))
}

#[async_trait]
impl PositionSource for ReplaySource {
    async fn current_position(&self, options: &PositionOptions) -> Result<Fix, PositionErrorCode> {
        let Some(first) = self.steps.first() else {
            return Err(PositionErrorCode::PositionUnavailable);
        };
        if let Some(timeout) = options.timeout {
            if first.delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(PositionErrorCode::Timeout);
            }
        }
        tokio::time::sleep(first.delay).await;
        first.event
    }

    fn watch_position(&self, _options: &PositionOptions) -> Subscription {
        spawn_feeder(self.steps.clone())
    }
}
