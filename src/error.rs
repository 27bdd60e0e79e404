use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Categorical error codes reported by a positioning source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionErrorCode {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    Unknown,
}

/// Errors surfaced to callers of the location entry points.
///
/// Reverse geocoding failures never show up here; they degrade to
/// placeholder strings instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied. Please enable location access and try again.")]
    PermissionDenied,

    #[error("Location information is unavailable. Please check your device settings.")]
    PositionUnavailable,

    #[error("Could not determine precise location in time. Please try again.")]
    Timeout,

    #[error("Geolocation is not supported in this environment.")]
    CapabilityUnavailable,

    #[error("An unknown error occurred while getting location.")]
    Unknown,
}

impl LocationError {
    /// Errors after which a continuous session can't produce anything useful.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LocationError::PermissionDenied | LocationError::CapabilityUnavailable
        )
    }
}

impl From<PositionErrorCode> for LocationError {
    fn from(code: PositionErrorCode) -> Self {
        match code {
            PositionErrorCode::PermissionDenied => LocationError::PermissionDenied,
            PositionErrorCode::PositionUnavailable => LocationError::PositionUnavailable,
            PositionErrorCode::Timeout => LocationError::Timeout,
            PositionErrorCode::Unknown => LocationError::Unknown,
        }
    }
}
