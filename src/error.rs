//! Error types and handling
//!
//! Capture failures are classified so the host UI can choose between
//! "retry", "relax constraints", and "give up" without string matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::Phase;

/// Errors produced by a capture session or its collaborators.
#[derive(Error, Debug, Clone)]
pub enum CaptureError {
    /// The user or OS declined camera/microphone access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No physical device matched the requested constraints.
    #[error("no capture device available: {0}")]
    DeviceUnavailable(String),

    /// None of the preferred encoding profiles is supported by the device.
    #[error("no supported encoding among {tried} candidates")]
    EncodingUnsupported { tried: usize },

    /// A facing-mode switch failed to re-acquire a stream.
    #[error("device switch failed: {0}")]
    DeviceSwitchFailed(String),

    /// The encoder reported a runtime fault mid-recording.
    #[error("recorder fault: {0}")]
    RecorderFault(String),

    /// An operation was called in a phase where it is not defined.
    /// Developer-facing; the session state is left untouched.
    #[error("{operation} is not valid while {phase:?}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    /// Anything the platform reported that fits no other class.
    #[error("capture error: {0}")]
    Other(String),
}

/// Serializable classification of a [`CaptureError`], stored in the session
/// snapshot as `last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    PermissionDenied,
    DeviceUnavailable,
    EncodingUnsupported,
    DeviceSwitchFailed,
    RecorderFault,
    InvalidPhase,
    Other,
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CaptureError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            CaptureError::EncodingUnsupported { .. } => ErrorKind::EncodingUnsupported,
            CaptureError::DeviceSwitchFailed(_) => ErrorKind::DeviceSwitchFailed,
            CaptureError::RecorderFault(_) => ErrorKind::RecorderFault,
            CaptureError::InvalidPhase { .. } => ErrorKind::InvalidPhase,
            CaptureError::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether retrying the same operation can reasonably succeed without
    /// relaxing constraints (e.g. the user grants permission in settings).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PermissionDenied | ErrorKind::DeviceSwitchFailed | ErrorKind::Other
        )
    }
}

/// Error response for host frontends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&CaptureError> for ErrorResponse {
    fn from(error: &CaptureError) -> Self {
        let code = match error.kind() {
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::DeviceUnavailable => "DEVICE_UNAVAILABLE",
            ErrorKind::EncodingUnsupported => "ENCODING_UNSUPPORTED",
            ErrorKind::DeviceSwitchFailed => "DEVICE_SWITCH_FAILED",
            ErrorKind::RecorderFault => "RECORDER_FAULT",
            ErrorKind::InvalidPhase => "INVALID_PHASE",
            ErrorKind::Other => "CAPTURE_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;
