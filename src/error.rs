use thiserror::Error;

use crate::model::SensorType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("permission denied for sensor {sensor}")]
    PermissionDenied { sensor: SensorType },
    #[error("sensor {sensor} failed to start sensing")]
    StartFailed { sensor: SensorType },
}

/// Failure reported by a platform call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PlatformError(pub String);

/// Reasons a scan gathered nothing. These never leave the scan task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("telephony service is not available")]
    ServiceUnavailable,
    #[error("malformed network operator {0:?}")]
    MalformedOperator(String),
    #[error("no legacy cell location")]
    MissingCellLocation,
    #[error("legacy cell location is not a gsm location")]
    UnexpectedCellLocation,
    #[error("platform call failed: {0}")]
    Platform(#[from] PlatformError),
    #[error("scan task panicked")]
    Panicked,
}
