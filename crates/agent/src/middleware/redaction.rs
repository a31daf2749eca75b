//! Regex-based redaction of personal data before the reasoner sees it.

use async_trait::async_trait;
use chainloom_config::{default_redaction_rules, RedactionRuleConfig};
use chainloom_core::agent::{AgentState, StatePatch};
use chainloom_core::error::AgentError;
use regex::Regex;
use tracing::debug;
use super::Middleware;

#[derive(Debug, Clone)]
struct Rule {
    pattern: Regex,
    replacement: String,
}

/// Rewrites matching substrings in every stored message. Message ids are
/// preserved so the conversation keeps its identity.
#[derive(Debug, Clone)]
pub struct RedactionMiddleware {
    rules: Vec<Rule>,
}

impl RedactionMiddleware {
    /// Email addresses and mainland phone numbers.
    pub fn new() -> Result<Self, regex::Error> {
        Self::from_rules(&default_redaction_rules())
    }

    pub fn from_rules(rules: &[RedactionRuleConfig]) -> Result<Self, regex::Error> {
        let rules = rules
            .iter()
            .map(|r| {
                Ok(Rule {
                    pattern: Regex::new(&r.pattern)?,
                    replacement: r.replacement.clone(),
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    /// Apply every rule in order.
    pub fn redact(&self, text: &str) -> String {
        self.rules.iter().fold(text.to_string(), |acc, rule| {
            rule.pattern
                .replace_all(&acc, rule.replacement.as_str())
                .into_owned()
        })
    }
}

#[async_trait]
impl Middleware for RedactionMiddleware {
    fn name(&self) -> &str {
        "redaction"
    }

    async fn before_model(&self, state: &AgentState) -> Result<Option<StatePatch>, AgentError> {
        let mut changed = 0usize;
        let messages = state
            .conversation
            .messages()
            .iter()
            .map(|m| {
                let redacted = self.redact(&m.content);
                if redacted == m.content {
                    m.clone()
                } else {
                    changed += 1;
                    m.with_content(redacted)
                }
            })
            .collect::<Vec<_>>();

        if changed == 0 {
            return Ok(None);
        }
        debug!(changed, "Redacted messages");
        Ok(Some(StatePatch::messages(messages)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainloom_core::message::{Conversation, Message};

    #[test]
    fn default_rules_mask_email_and_phone() {
        let mw = RedactionMiddleware::new().unwrap();
        assert_eq!(
            mw.redact("mail me at jane.doe@example.com or call 13812345678"),
            "mail me at [EMAIL] or call [PHONE]"
        );
        assert_eq!(mw.redact("+8613912345678"), "[PHONE]");
        assert_eq!(mw.redact("nothing here"), "nothing here");
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let rules = vec![RedactionRuleConfig {
            pattern: "(".into(),
            replacement: "x".into(),
        }];
        assert!(RedactionMiddleware::from_rules(&rules).is_err());
    }

    #[tokio::test]
    async fn patches_only_when_something_matched() {
        let mw = RedactionMiddleware::new().unwrap();

        let mut conv = Conversation::new();
        conv.push(Message::user("hello"));
        let state = AgentState::new(conv, None);
        assert!(mw.before_model(&state).await.unwrap().is_none());

        let mut conv = Conversation::new();
        conv.push(Message::user("hello"));
        conv.push(Message::user("my email is a@b.io"));
        let original_id = conv.messages()[1].id.clone();
        let mut state = AgentState::new(conv, None);
        let patch = mw.before_model(&state).await.unwrap().unwrap();
        state.apply(patch);

        let messages = state.conversation.messages();
        assert_eq!(messages[1].content, "my email is [EMAIL]");
        assert_eq!(messages[1].id, original_id);
        assert_eq!(messages[0].content, "hello");
    }
}
