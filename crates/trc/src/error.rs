use thiserror::Error;
use trc_collect::{StopReason, TraceError};

/// Errors returned by the trace API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Tracer resolution or finalization failed.
    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error("invalid timeout {value:?}: {reason}")]
    InvalidTimeout { value: String, reason: String },

    /// Failure reported by the execution collaborator, displayed verbatim.
    #[error(transparent)]
    Execution(Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
    /// Wrap a collaborator error.
    pub fn execution(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Execution(Box::new(err))
    }

    /// Stop cause when the trace ran but was cut short.
    pub const fn stop_reason(&self) -> Option<&StopReason> {
        match self {
            Self::Trace(err) => err.stop_reason(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
