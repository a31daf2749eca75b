//! Conversation compaction by summarization.
//!
//! When the estimated size of the conversation passes a threshold, every
//! message except the newest `messages_to_keep` is replaced by one system
//! message holding a summary. This is the only place the conversation's
//! append-only ordering is relaxed.

use async_trait::async_trait;
use chainloom_core::agent::{AgentState, StatePatch};
use chainloom_core::error::AgentError;
use chainloom_core::message::{render_transcript, Message};
use chainloom_core::reasoner::{Reasoner, ReasoningRequest, ReasoningResponse};
use chainloom_pipeline::PromptTemplate;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;
use super::Middleware;
use crate::token::messages_tokens;

const DEFAULT_PROMPT: &str = "Summarize the conversation below in a few sentences. \
Keep names, facts and open requests.\n\n{messages}";

/// Metadata key marking a compaction summary message.
pub const SUMMARY_KEY: &str = "summary";

pub struct SummarizationMiddleware {
    summarizer: Arc<dyn Reasoner>,
    max_tokens_before_summary: usize,
    messages_to_keep: usize,
    prompt: String,
}

impl SummarizationMiddleware {
    /// `messages_to_keep` is raised to 1 so the newest user input always
    /// survives compaction.
    pub fn new(
        summarizer: Arc<dyn Reasoner>,
        max_tokens_before_summary: usize,
        messages_to_keep: usize,
    ) -> Self {
        Self {
            summarizer,
            max_tokens_before_summary,
            messages_to_keep: messages_to_keep.max(1),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    /// Use a custom summary prompt. It must reference `{messages}`.
    pub fn with_prompt(mut self, template: &str) -> Result<Self, AgentError> {
        let prompt = PromptTemplate::new(template)
            .map_err(|e| AgentError::middleware("summarization", e.to_string()))?;
        if !prompt.input_variables().iter().any(|v| v == "messages") {
            return Err(AgentError::middleware(
                "summarization",
                "summary prompt must contain {messages}",
            ));
        }
        self.prompt = prompt.template().to_string();
        Ok(self)
    }

    async fn summarize(&self, messages: &[Message]) -> Result<String, AgentError> {
        let mut vars = Map::new();
        vars.insert("messages".into(), Value::String(render_transcript(messages)));
        let prompt = PromptTemplate::new(self.prompt.as_str())
            .and_then(|t| t.format(&vars))
            .map_err(|e| AgentError::middleware(self.name(), e.to_string()))?;

        match self
            .summarizer
            .reason(ReasoningRequest::new(vec![Message::user(prompt)]))
            .await?
        {
            ReasoningResponse::Final { text } => Ok(text),
            ReasoningResponse::ToolCall { name, .. } => Err(AgentError::middleware(
                self.name(),
                format!("summarizer requested tool '{name}'"),
            )),
        }
    }
}

#[async_trait]
impl Middleware for SummarizationMiddleware {
    fn name(&self) -> &str {
        "summarization"
    }

    async fn before_model(&self, state: &AgentState) -> Result<Option<StatePatch>, AgentError> {
        let messages = state.conversation.messages();
        let tokens = messages_tokens(messages);
        if tokens <= self.max_tokens_before_summary || messages.len() <= self.messages_to_keep {
            return Ok(None);
        }

        let (older, recent) = messages.split_at(messages.len() - self.messages_to_keep);
        let summary = self.summarize(older).await?;

        info!(
            conversation_id = %state.conversation.id,
            tokens,
            summarized = older.len(),
            kept = recent.len(),
            "Compacting conversation"
        );

        let mut compacted = Vec::with_capacity(recent.len() + 1);
        compacted.push(
            Message::system(format!("Summary of the earlier conversation: {summary}"))
                .with_metadata(SUMMARY_KEY, Value::Bool(true)),
        );
        compacted.extend(recent.iter().cloned());
        Ok(Some(StatePatch::messages(compacted)))
    }
}
