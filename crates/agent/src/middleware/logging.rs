//! Tracing around each reasoning call.

use async_trait::async_trait;
use chainloom_core::agent::{AgentState, StatePatch};
use chainloom_core::error::AgentError;
use chainloom_core::reasoner::{ReasoningRequest, ReasoningResponse};
use std::time::Instant;
use tracing::{debug, info};
use super::{Middleware, Next};

/// Logs message counts before the call, latency around it, and the kind of
/// response after it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn before_model(&self, state: &AgentState) -> Result<Option<StatePatch>, AgentError> {
        info!(
            conversation_id = %state.conversation.id,
            messages = state.conversation.len(),
            "Calling reasoner"
        );
        Ok(None)
    }

    async fn wrap_model_call(
        &self,
        request: ReasoningRequest,
        next: Next<'_>,
    ) -> Result<ReasoningResponse, AgentError> {
        let start = Instant::now();
        let result = next.run(request).await;
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Reasoner returned"
        );
        result
    }

    async fn after_model(
        &self,
        state: &AgentState,
        response: &ReasoningResponse,
    ) -> Result<Option<StatePatch>, AgentError> {
        match response {
            ReasoningResponse::Final { text } => info!(
                conversation_id = %state.conversation.id,
                chars = text.len(),
                "Reasoner produced final answer"
            ),
            ReasoningResponse::ToolCall { name, .. } => info!(
                conversation_id = %state.conversation.id,
                tool = %name,
                "Reasoner requested tool"
            ),
        }
        Ok(None)
    }
}
