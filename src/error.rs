//! Error handling for voxshift
//!
//! Every failure the core can report is a `VoxError` variant. All of them
//! carry a human-readable message and a recovery hint; none are retried
//! automatically.

use thiserror::Error;

/// Result type alias for voxshift operations
pub type Result<T> = std::result::Result<T, VoxError>;

/// Main error type for voxshift operations
#[derive(Error, Debug)]
pub enum VoxError {
    // Capture Errors
    #[error("Capture device error: {reason}")]
    CaptureDevice { reason: String },

    #[error("Failed to decode captured audio: {reason}")]
    Decode {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Effect Definition Errors
    #[error("Invalid effect parameter: {param} = {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Unknown effect: {id}")]
    UnknownEffect { id: String },

    #[error("Duplicate effect id: {id}")]
    DuplicateEffect { id: String },

    // Processing Errors
    #[error("Render failed: {reason}")]
    Render { reason: String },

    #[error("Render cancelled")]
    Cancelled,

    #[error("Encode failed: {reason}")]
    Encode { reason: String },

    // Session Errors
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("An effect is already being applied")]
    Busy,

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VoxError {
    /// Build an `InvalidParameter` error
    pub(crate) fn invalid_param(
        param: &str,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        VoxError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Build a `Decode` error wrapping a lower-level cause
    pub(crate) fn decode<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        VoxError::Decode {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            VoxError::CaptureDevice { .. } => "CAPTURE_DEVICE",
            VoxError::Decode { .. } => "DECODE_ERROR",
            VoxError::InvalidParameter { .. } => "INVALID_PARAMETER",
            VoxError::UnknownEffect { .. } => "UNKNOWN_EFFECT",
            VoxError::DuplicateEffect { .. } => "DUPLICATE_EFFECT",
            VoxError::Render { .. } => "RENDER_ERROR",
            VoxError::Cancelled => "CANCELLED",
            VoxError::Encode { .. } => "ENCODE_ERROR",
            VoxError::InvalidState { .. } => "INVALID_STATE",
            VoxError::Busy => "BUSY",
            VoxError::Io(_) => "IO_ERROR",
            VoxError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the caller can reasonably try the operation again
    ///
    /// `Encode` is a contract violation and never recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VoxError::CaptureDevice { .. }
                | VoxError::Decode { .. }
                | VoxError::Render { .. }
                | VoxError::Cancelled
                | VoxError::Busy
                | VoxError::UnknownEffect { .. }
        )
    }

    /// Returns a suggested recovery action for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            VoxError::CaptureDevice { .. } => {
                "Check microphone permissions and that an input device is connected"
            }
            VoxError::Decode { .. } => "Record the take again; the captured audio was unreadable",
            VoxError::InvalidParameter { .. } => "Adjust the parameter to be within valid range",
            VoxError::UnknownEffect { .. } => "Pick an effect from the catalog listing",
            VoxError::DuplicateEffect { .. } => "Register the effect under a unique id",
            VoxError::Render { .. } => "Try applying the effect again or choose another effect",
            VoxError::Cancelled => "Apply the effect again when ready",
            VoxError::Busy => "Wait for the current effect to finish processing",
            VoxError::InvalidState { .. } => "Record something before applying effects",
            _ => "Check the error details and try again",
        }
    }
}
