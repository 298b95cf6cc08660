//! Caller-supplied cancellation for guardian operations
//!
//! A `Context` bundles an optional [`CancellationToken`] with an optional
//! deadline. Guardian calls race each of their suspension points against
//! [`Context::done`]; whichever side completes first decides the result.

use crate::errors::GuardianError;
use core::future;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Cancellation signal and deadline for a single guardian call
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never fires
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self::background().and_cancellation(token)
    }

    /// Deadline `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().and_timeout(timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().and_deadline(deadline)
    }

    pub fn and_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn and_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.and_deadline(deadline),
            // Too far out to represent; behaves as no deadline
            None => self,
        }
    }

    /// Keeps the earlier deadline if one is already set
    pub fn and_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The error this context has already produced, if any
    pub fn err(&self) -> Option<GuardianError> {
        if self.token.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Some(GuardianError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(GuardianError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context fires. Explicit cancellation wins a tie
    /// with the deadline.
    pub async fn done(&self) -> GuardianError {
        match (&self.token, self.deadline) {
            (None, None) => future::pending().await,
            (Some(token), None) => {
                token.cancelled().await;
                GuardianError::Cancelled
            }
            (None, Some(deadline)) => {
                time::sleep_until(deadline).await;
                GuardianError::DeadlineExceeded
            }
            (Some(token), Some(deadline)) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => GuardianError::Cancelled,
                    _ = time::sleep_until(deadline) => GuardianError::DeadlineExceeded,
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
