//! Memoized final answers keyed by request.

use async_trait::async_trait;
use chainloom_core::error::AgentError;
use chainloom_core::reasoner::{ReasoningRequest, ReasoningResponse};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;
use super::{Middleware, Next};

/// Answers repeated requests from memory. Only final answers are cached;
/// tool calls always reach the reasoner.
#[derive(Debug, Default)]
pub struct CacheMiddleware {
    entries: Mutex<HashMap<String, ReasoningResponse>>,
    hits: AtomicUsize,
}

impl CacheMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(request: &ReasoningRequest) -> String {
        let messages: Vec<(&str, &str)> = request
            .messages
            .iter()
            .map(|m| (m.role.label(), m.content.as_str()))
            .collect();
        let tools: Vec<&str> = request.tools.iter().map(|t| t.name.as_str()).collect();
        serde_json::json!({ "messages": messages, "tools": tools }).to_string()
    }
}

#[async_trait]
impl Middleware for CacheMiddleware {
    fn name(&self) -> &str {
        "cache"
    }

    async fn wrap_model_call(
        &self,
        request: ReasoningRequest,
        next: Next<'_>,
    ) -> Result<ReasoningResponse, AgentError> {
        let key = Self::key(&request);
        let cached = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        if let Some(response) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Reasoning cache hit");
            return Ok(response);
        }

        let response = next.run(request).await?;
        if !response.is_tool_call() {
            self.entries
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key, response.clone());
        }
        Ok(response)
    }
}
