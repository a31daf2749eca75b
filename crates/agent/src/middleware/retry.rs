//! Retry of the wrapped reasoning call.

use async_trait::async_trait;
use chainloom_core::error::AgentError;
use chainloom_core::reasoner::{ReasoningRequest, ReasoningResponse};
use std::time::Duration;
use tracing::warn;
use super::{Middleware, Next};

/// Re-runs the wrapped call on transient reasoner failures and timeouts.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    max_attempts: u32,
    delay: Duration,
}

impl RetryMiddleware {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    fn is_transient(err: &AgentError) -> bool {
        match err {
            AgentError::Reasoner(e) => e.is_retryable(),
            other => other.is_timeout(),
        }
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    fn name(&self) -> &str {
        "retry"
    }

    async fn wrap_model_call(
        &self,
        request: ReasoningRequest,
        next: Next<'_>,
    ) -> Result<ReasoningResponse, AgentError> {
        let mut attempt = 1;
        loop {
            match next.run(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.max_attempts && Self::is_transient(&e) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Reasoning call failed, retrying"
                    );
                    attempt += 1;
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
