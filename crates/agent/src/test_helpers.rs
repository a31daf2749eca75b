//! Shared test helpers for agent and middleware tests.

use async_trait::async_trait;
use chainloom_core::error::ReasonerError;
use chainloom_core::reasoner::{Reasoner, ReasoningRequest, ReasoningResponse};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A reasoner that replays scripted outcomes in order.
///
/// Queued errors are returned before any response. Once the script runs
/// out, the last response repeats if `repeat_last` is set, otherwise the
/// call fails with `InvalidResponse`.
pub struct ScriptedReasoner {
    responses: Mutex<VecDeque<ReasoningResponse>>,
    errors: Mutex<VecDeque<ReasonerError>>,
    repeat_last: bool,
    call_count: AtomicUsize,
    requests: Mutex<Vec<ReasoningRequest>>,
    log: Option<Arc<Mutex<Vec<String>>>>,
    delay: Option<Duration>,
}

impl ScriptedReasoner {
    pub fn new(responses: Vec<ReasoningResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            errors: Mutex::new(VecDeque::new()),
            repeat_last: false,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            log: None,
            delay: None,
        }
    }

    /// Final answers only.
    pub fn finals(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| ReasoningResponse::final_text(*t)).collect())
    }

    /// One tool call, then a final answer.
    pub fn tool_then_answer(tool: &str, input: &str, answer: &str) -> Self {
        Self::new(vec![
            ReasoningResponse::tool_call(tool, input),
            ReasoningResponse::final_text(answer),
        ])
    }

    /// The same response on every call.
    pub fn always(response: ReasoningResponse) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(vec![response])
        }
    }

    /// Fail with these errors before replaying the script.
    pub fn failing_first(mut self, errors: Vec<ReasonerError>) -> Self {
        self.errors = Mutex::new(errors.into());
        self
    }

    /// Push `"reasoner"` into `log` on every call.
    pub fn with_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn reason(&self, request: ReasoningRequest) -> Result<ReasoningResponse, ReasonerError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if let Some(log) = &self.log {
            log.lock().unwrap().push("reasoner".into());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.errors.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut responses = self.responses.lock().unwrap();
        if self.repeat_last && responses.len() == 1 {
            return Ok(responses[0].clone());
        }
        responses
            .pop_front()
            .ok_or_else(|| ReasonerError::InvalidResponse("script exhausted".into()))
    }
}
