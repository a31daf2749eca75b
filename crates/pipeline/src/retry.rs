//! Retry wrapper for flaky steps (typically model calls).

use async_trait::async_trait;
use chainloom_core::error::PipelineError;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use crate::step::Step;

/// Re-invokes the inner step on failure, up to `max_attempts` times in
/// total, sleeping `delay` between attempts. With a fallback set, the
/// fallback value is returned instead of the last error.
pub struct Retry {
    name: String,
    inner: Arc<dyn Step>,
    max_attempts: u32,
    delay: Duration,
    fallback: Option<Value>,
}

impl Retry {
    pub fn new<S: Step + 'static>(inner: S, max_attempts: u32) -> Self {
        Self {
            name: format!("retry({})", inner.name()),
            inner: Arc::new(inner),
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
            fallback: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_fallback(mut self, value: impl Into<Value>) -> Self {
        self.fallback = Some(value.into());
        self
    }
}

#[async_trait]
impl Step for Retry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        let mut attempt = 1;
        loop {
            match self.inner.invoke(input.clone()).await {
                Ok(output) => return Ok(output),
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        step = self.inner.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Step failed, retrying"
                    );
                    attempt += 1;
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                Err(e) => {
                    return match &self.fallback {
                        Some(value) => {
                            warn!(step = self.inner.name(), error = %e, "Retries exhausted, using fallback");
                            Ok(value.clone())
                        }
                        None => Err(e),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::FnStep;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky(failures: u32, calls: Arc<AtomicU32>) -> FnStep {
        FnStep::new("flaky", move |v| {
            if calls.fetch_add(1, Ordering::SeqCst) < failures {
                Err(PipelineError::step("flaky", "temporarily down"))
            } else {
                Ok(v)
            }
        })
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let step = Retry::new(flaky(2, Arc::clone(&calls)), 3);
        assert_eq!(step.invoke(json!("ok")).await.unwrap(), json!("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let step = Retry::new(flaky(10, Arc::clone(&calls)), 3);
        assert!(step.invoke(json!(1)).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_after_exhaustion() {
        let calls = Arc::new(AtomicU32::new(0));
        let step = Retry::new(flaky(10, Arc::clone(&calls)), 2)
            .with_delay(Duration::from_secs(2))
            .with_fallback("service unavailable, try again later");
        let out = step.invoke(json!(1)).await.unwrap();
        assert_eq!(out, json!("service unavailable, try again later"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
