use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why a tracer was asked to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The execution budget ran out.
    Timeout(Duration),
    /// Stopped by the caller or the execution collaborator.
    Interrupted(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(budget) => write!(f, "execution timeout after {budget:?}"),
            Self::Interrupted(msg) => f.write_str(msg),
        }
    }
}

/// Errors produced while building or finalizing a tracer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("tracer compilation failed: {diagnostic}")]
    Compile { diagnostic: String },

    #[error("tracer cannot bind to execution context: missing {field}")]
    ContextBinding { field: String },

    #[error("tracer stopped: {reason}")]
    Cancelled { reason: StopReason },
}

impl TraceError {
    /// Build a compile error from an interpreter diagnostic.
    pub fn compile(diagnostic: impl Into<String>) -> Self {
        Self::Compile {
            diagnostic: diagnostic.into(),
        }
    }

    /// Build a binding error for the named context field.
    pub fn binding(field: impl Into<String>) -> Self {
        Self::ContextBinding {
            field: field.into(),
        }
    }

    /// Stop reason, if this error comes from a cancelled tracer.
    pub const fn stop_reason(&self) -> Option<&StopReason> {
        match self {
            Self::Cancelled { reason } => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TraceError>;
