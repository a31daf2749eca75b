//! Middleware around the reasoning call.
//!
//! A [`Middleware`] can hook in at three points of every reasoning call:
//!
//! 1. `before_model` runs first, for every middleware in registration order.
//!    A returned [`StatePatch`] is merged before the next hook runs.
//! 2. `wrap_model_call` receives the outbound request and an explicit
//!    [`Next`] continuation. The first registered middleware is the
//!    outermost wrapper. Not calling `next` short-circuits the call, calling
//!    it several times retries it.
//! 3. `after_model` runs last, again in registration order.
//!
//! So for `[A(wrap), B(pre), C(post)]` one call runs
//! `B.before → A (before next) → reasoner → A (after next) → C.after`.
//!
//! The chain is fixed when the agent is built.

pub mod cache;
pub mod logging;
pub mod redaction;
pub mod retry;
pub mod summarization;

use async_trait::async_trait;
use chainloom_core::agent::{AgentState, StatePatch};
use chainloom_core::error::AgentError;
use chainloom_core::reasoner::{Reasoner, ReasoningRequest, ReasoningResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use cache::CacheMiddleware;
pub use logging::LoggingMiddleware;
pub use redaction::RedactionMiddleware;
pub use retry::RetryMiddleware;
pub use summarization::SummarizationMiddleware;

/// An interceptor around the agent's reasoning call. Every hook defaults to
/// a no-op, so implementations override only what they need.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Inspect the state before the call. A failure aborts the turn before
    /// the reasoner is invoked.
    async fn before_model(&self, _state: &AgentState) -> Result<Option<StatePatch>, AgentError> {
        Ok(None)
    }

    /// Wrap the call itself.
    async fn wrap_model_call(
        &self,
        request: ReasoningRequest,
        next: Next<'_>,
    ) -> Result<ReasoningResponse, AgentError> {
        next.run(request).await
    }

    /// Inspect the state after the call. A final answer is already in the
    /// conversation at this point and is not rolled back on failure.
    async fn after_model(
        &self,
        _state: &AgentState,
        _response: &ReasoningResponse,
    ) -> Result<Option<StatePatch>, AgentError> {
        Ok(None)
    }
}

/// The rest of the wrap chain, ending in the reasoner.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    reasoner: &'a dyn Reasoner,
    timeout: Option<Duration>,
}

impl<'a> Next<'a> {
    /// Run the remaining wrappers and the reasoner once.
    pub async fn run(self, request: ReasoningRequest) -> Result<ReasoningResponse, AgentError> {
        match self.remaining.split_first() {
            Some((outer, rest)) => {
                let next = Next {
                    remaining: rest,
                    ..self
                };
                outer.wrap_model_call(request, next).await
            }
            None => self.call_reasoner(request).await,
        }
    }

    async fn call_reasoner(self, request: ReasoningRequest) -> Result<ReasoningResponse, AgentError> {
        let Some(limit) = self.timeout else {
            return Ok(self.reasoner.reason(request).await?);
        };
        match tokio::time::timeout(limit, self.reasoner.reason(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AgentError::Timeout {
                operation: format!("reasoning call to '{}'", self.reasoner.name()),
                after_ms: limit.as_millis() as u64,
            }),
        }
    }
}

/// Ordered middleware list, built once per agent.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn names(&self) -> Vec<&str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run every `before_model` hook, merging patches as they come.
    pub async fn before_model(&self, state: &mut AgentState) -> Result<(), AgentError> {
        for middleware in &self.middlewares {
            let patch = middleware.before_model(state).await.inspect_err(|e| {
                warn!(middleware = middleware.name(), error = %e, "before_model hook failed");
            })?;
            if let Some(patch) = patch {
                state.apply(patch);
            }
        }
        Ok(())
    }

    /// Send the request through the wrap chain to the reasoner.
    pub async fn call_model(
        &self,
        request: ReasoningRequest,
        reasoner: &dyn Reasoner,
        timeout: Option<Duration>,
    ) -> Result<ReasoningResponse, AgentError> {
        let next = Next {
            remaining: &self.middlewares,
            reasoner,
            timeout,
        };
        next.run(request).await
    }

    /// Run every `after_model` hook, merging patches as they come.
    pub async fn after_model(
        &self,
        state: &mut AgentState,
        response: &ReasoningResponse,
    ) -> Result<(), AgentError> {
        for middleware in &self.middlewares {
            let patch = middleware.after_model(state, response).await.inspect_err(|e| {
                warn!(middleware = middleware.name(), error = %e, "after_model hook failed");
            })?;
            if let Some(patch) = patch {
                state.apply(patch);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedReasoner;
    use chainloom_core::message::{Conversation, Message};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn record(log: &Log, entry: impl Into<String>) {
        log.lock().unwrap().push(entry.into());
    }

    struct Pre {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl Middleware for Pre {
        fn name(&self) -> &str {
            self.name
        }

        async fn before_model(&self, state: &AgentState) -> Result<Option<StatePatch>, AgentError> {
            record(&self.log, format!("{}.pre", self.name));
            // Each hook sees what the previous one wrote.
            let seen = state.metadata.len();
            Ok(Some(StatePatch::metadata(self.name, serde_json::json!(seen))))
        }
    }

    struct Post {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl Middleware for Post {
        fn name(&self) -> &str {
            self.name
        }

        async fn after_model(
            &self,
            _state: &AgentState,
            _response: &ReasoningResponse,
        ) -> Result<Option<StatePatch>, AgentError> {
            record(&self.log, format!("{}.post", self.name));
            Ok(None)
        }
    }

    struct Wrap {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl Middleware for Wrap {
        fn name(&self) -> &str {
            self.name
        }

        async fn wrap_model_call(
            &self,
            request: ReasoningRequest,
            next: Next<'_>,
        ) -> Result<ReasoningResponse, AgentError> {
            record(&self.log, format!("{}.before", self.name));
            let response = next.run(request).await;
            record(&self.log, format!("{}.after", self.name));
            response
        }
    }

    /// Never calls the continuation.
    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        fn name(&self) -> &str {
            "short_circuit"
        }

        async fn wrap_model_call(
            &self,
            _request: ReasoningRequest,
            _next: Next<'_>,
        ) -> Result<ReasoningResponse, AgentError> {
            Ok(ReasoningResponse::final_text("from cache"))
        }
    }

    struct FailingPre;

    #[async_trait]
    impl Middleware for FailingPre {
        fn name(&self) -> &str {
            "failing_pre"
        }

        async fn before_model(&self, _state: &AgentState) -> Result<Option<StatePatch>, AgentError> {
            Err(AgentError::middleware("failing_pre", "refused"))
        }
    }

    fn state() -> AgentState {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        AgentState::new(conv, None)
    }

    async fn one_call(chain: &MiddlewareChain, reasoner: &ScriptedReasoner) -> Result<(), AgentError> {
        let mut state = state();
        chain.before_model(&mut state).await?;
        let request = ReasoningRequest::new(state.context_messages());
        let response = chain.call_model(request, reasoner, None).await?;
        chain.after_model(&mut state, &response).await
    }

    #[tokio::test]
    async fn pre_hooks_run_in_registration_order() {
        let log: Log = Arc::default();
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(Pre { name: "A", log: log.clone() }));
        chain.push(Arc::new(Pre { name: "B", log: log.clone() }));

        let reasoner = ScriptedReasoner::finals(&["one", "two"]);
        let mut state = state();
        chain.before_model(&mut state).await.unwrap();
        assert_eq!(state.metadata["A"], 0);
        assert_eq!(state.metadata["B"], 1);

        one_call(&chain, &reasoner).await.unwrap();
        one_call(&chain, &reasoner).await.unwrap();
        let log = log.lock().unwrap().clone();
        assert_eq!(log, vec!["A.pre", "B.pre", "A.pre", "B.pre", "A.pre", "B.pre"]);
    }

    #[tokio::test]
    async fn wrap_pre_post_ordering() {
        let log: Log = Arc::default();
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(Wrap { name: "A", log: log.clone() }));
        chain.push(Arc::new(Pre { name: "B", log: log.clone() }));
        chain.push(Arc::new(Post { name: "C", log: log.clone() }));

        let reasoner = ScriptedReasoner::finals(&["done"]).with_log(log.clone());
        one_call(&chain, &reasoner).await.unwrap();

        let log = log.lock().unwrap().clone();
        assert_eq!(log, vec!["B.pre", "A.before", "reasoner", "A.after", "C.post"]);
    }

    #[tokio::test]
    async fn nested_wraps_first_is_outermost() {
        let log: Log = Arc::default();
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(Wrap { name: "outer", log: log.clone() }));
        chain.push(Arc::new(Wrap { name: "inner", log: log.clone() }));

        let reasoner = ScriptedReasoner::finals(&["done"]).with_log(log.clone());
        one_call(&chain, &reasoner).await.unwrap();

        let log = log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec!["outer.before", "inner.before", "reasoner", "inner.after", "outer.after"]
        );
    }

    #[tokio::test]
    async fn short_circuit_skips_reasoner() {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(ShortCircuit));

        let reasoner = ScriptedReasoner::finals(&["never"]);
        let response = chain
            .call_model(ReasoningRequest::default(), &reasoner, None)
            .await
            .unwrap();
        assert_eq!(response, ReasoningResponse::final_text("from cache"));
        assert_eq!(reasoner.call_count(), 0);
    }

    #[tokio::test]
    async fn failing_pre_hook_aborts_before_call() {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(FailingPre));

        let reasoner = ScriptedReasoner::finals(&["never"]);
        let err = one_call(&chain, &reasoner).await.unwrap_err();
        assert!(matches!(err, AgentError::Middleware { ref middleware, .. } if middleware == "failing_pre"));
        assert_eq!(reasoner.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reasoner_timeout_is_distinguishable() {
        let chain = MiddlewareChain::new();
        let reasoner = ScriptedReasoner::finals(&["late"]).with_delay(Duration::from_secs(5));
        let err = chain
            .call_model(ReasoningRequest::default(), &reasoner, Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, AgentError::Timeout { after_ms: 100, .. }));
    }
}
