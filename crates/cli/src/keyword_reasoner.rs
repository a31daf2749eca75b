//! An offline reasoner that routes on keywords.
//!
//! It stands in for a hosted model in the CLI demo: enough to drive the
//! agent loop through real tool calls without a network connection.

use async_trait::async_trait;
use chainloom_core::error::ReasonerError;
use chainloom_core::message::Role;
use chainloom_core::reasoner::{Reasoner, ReasoningRequest, ReasoningResponse};
use chainloom_tools::extract_order_id;

const HELP: &str = "I can tell you the time, check the weather, suggest somewhere to get a drink, \
or look up an order (give me an id like ORD1234567890).";

#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordReasoner;

impl KeywordReasoner {
    fn route(text: &str) -> Option<(&'static str, String)> {
        let lower = text.to_lowercase();
        if let Some(id) = extract_order_id(text) {
            return Some(("order_lookup", id.to_string()));
        }
        if lower.contains("weather") || lower.contains("天气") {
            let location = lower
                .split_once(" in ")
                .map(|(_, rest)| rest.trim_end_matches(['?', '.', '!']).trim().to_string())
                .unwrap_or_default();
            return Some(("weather_lookup", location));
        }
        if lower.contains("drink") || lower.contains("thirsty") || lower.contains("喝") {
            return Some(("recommend_drink", String::new()));
        }
        if lower.contains("time") || lower.contains("date") || lower.contains("时间") {
            return Some(("current_time", String::new()));
        }
        None
    }

    /// Counts the human lines of a transcript and quotes the last one.
    fn summarize(prompt: &str) -> String {
        let topics: Vec<&str> = prompt
            .lines()
            .filter_map(|l| l.strip_prefix("Human: "))
            .collect();
        match topics.as_slice() {
            [] => "No user requests so far.".into(),
            [.., last] => format!(
                "The user asked {} question(s), most recently: {last}",
                topics.len()
            ),
        }
    }
}

#[async_trait]
impl Reasoner for KeywordReasoner {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn reason(&self, request: ReasoningRequest) -> Result<ReasoningResponse, ReasonerError> {
        let last = request
            .messages
            .last()
            .ok_or_else(|| ReasonerError::InvalidResponse("empty request".into()))?;

        // A tool just answered: relay it.
        if last.role == Role::Tool {
            return Ok(ReasoningResponse::final_text(last.content.clone()));
        }

        // No tools offered means a plain completion, such as a summary.
        if request.tools.is_empty() {
            return Ok(ReasoningResponse::final_text(Self::summarize(&last.content)));
        }

        let offered = |name: &str| request.tools.iter().any(|t| t.name == name);
        match Self::route(&last.content) {
            Some((tool, input)) if offered(tool) => Ok(ReasoningResponse::tool_call(tool, input)),
            _ => Ok(ReasoningResponse::final_text(HELP)),
        }
    }
}
