//! Error types for the state guardian
//!
//! Every failure is reported synchronously to the caller. Nothing inside the
//! guardian retries on its own.

use core::fmt;

// ----------------------------------------------------------------------------
// Operation Kind
// ----------------------------------------------------------------------------

/// The caller-facing operation that was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Write => write!(f, "write"),
        }
    }
}

// ----------------------------------------------------------------------------
// Guardian Error
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardianError {
    /// The cleanup function has run (or the coordinating task is gone)
    #[error("unable to {operation} after cleanup function called")]
    Closed { operation: Operation },

    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid guardian configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("no Tokio runtime available to host the coordinating task")]
    NoRuntime,
}

impl GuardianError {
    pub(crate) fn closed(operation: Operation) -> Self {
        GuardianError::Closed { operation }
    }

    /// True for rejections caused by cleanup
    pub fn is_closed(&self) -> bool {
        matches!(self, GuardianError::Closed { .. })
    }

    /// True when the caller's context cancelled or timed out the call
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            GuardianError::Cancelled | GuardianError::DeadlineExceeded
        )
    }
}

pub type GuardianResult<T> = core::result::Result<T, GuardianError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
