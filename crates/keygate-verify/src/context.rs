//! Per-call deadline and cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::VerifyError;

/// Deadline and cancellation shared by every suspending step of one call.
///
/// Once either fires, [`CallContext::run`] refuses to start further steps.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    /// No deadline, fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one step under the context.
    pub async fn run<F: Future>(&self, operation: &'static str, step: F) -> Result<F::Output, VerifyError> {
        if self.cancel.is_cancelled() {
            return Err(VerifyError::Cancelled { operation });
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(VerifyError::Timeout { operation });
        }

        let bounded = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::timeout_at(deadline, step).await.map_err(|_| VerifyError::Timeout { operation })
                }
                None => Ok(step.await),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(VerifyError::Cancelled { operation }),
            result = bounded => result,
        }
    }
}
