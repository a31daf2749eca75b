//! Prompt templates.
//!
//! Placeholders are written `{name}`; `{{` and `}}` produce literal braces.
//! Templates are parsed once at construction so formatting never sees a
//! malformed template.

use async_trait::async_trait;
use chainloom_core::error::{PipelineError, TemplateError};
use chainloom_core::message::{render_transcript, Message, Role};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use crate::step::Step;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

fn parse(template: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((inner, '{')) => {
                            return Err(TemplateError::Malformed {
                                position: inner,
                                reason: "nested '{'".into(),
                            });
                        }
                        Some((_, ch)) => name.push(ch),
                        None => {
                            return Err(TemplateError::Malformed {
                                position: pos,
                                reason: "unclosed '{'".into(),
                            });
                        }
                    }
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::Malformed {
                        position: pos,
                        reason: "empty placeholder".into(),
                    });
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Variable(name.to_string()));
            }
            '}' => {
                return Err(TemplateError::Malformed {
                    position: pos,
                    reason: "unmatched '}'".into(),
                });
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Strings are inserted verbatim, everything else as compact JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A single-string prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    segments: Vec<Segment>,
    partials: Map<String, Value>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        let segments = parse(&template)?;
        Ok(Self {
            template,
            segments,
            partials: Map::new(),
        })
    }

    /// Pre-fill a variable.
    pub fn partial(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.partials.insert(name.into(), value.into());
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Variables the caller still has to supply, sorted.
    pub fn input_variables(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Variable(name) if !self.partials.contains_key(name) => Some(name.clone()),
                _ => None,
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Substitute every placeholder.
    pub fn format(&self, vars: &Map<String, Value>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = vars
                        .get(name)
                        .or_else(|| self.partials.get(name))
                        .ok_or_else(|| TemplateError::MissingVariable(name.clone()))?;
                    out.push_str(&render_value(value));
                }
            }
        }
        Ok(out)
    }
}

/// Turn a step input into template variables. A bare string is accepted
/// when exactly one variable is expected.
fn variables_from_input(
    step: &str,
    input: Value,
    expected: &[String],
) -> Result<Map<String, Value>, PipelineError> {
    match input {
        Value::Object(map) => Ok(map),
        Value::String(s) if expected.len() == 1 => {
            let mut map = Map::new();
            map.insert(expected[0].clone(), Value::String(s));
            Ok(map)
        }
        other => Err(PipelineError::invalid_input(step, "object", &other)),
    }
}

#[async_trait]
impl Step for PromptTemplate {
    fn name(&self) -> &str {
        "prompt_template"
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        let vars = variables_from_input(self.name(), input, &self.input_variables())?;
        Ok(Value::String(self.format(&vars)?))
    }
}

/// Parse a message from its JSON form. Accepts full serialized messages
/// and the short `{"role": ..., "content": ...}` form.
pub fn message_from_value(value: &Value) -> Option<Message> {
    if let Ok(message) = serde_json::from_value::<Message>(value.clone()) {
        return Some(message);
    }
    let role = value.get("role")?.as_str()?.parse::<Role>().ok()?;
    let content = value.get("content")?.as_str()?;
    Some(Message::new(role, content))
}

/// Parse an array of messages; `None` if any element is not a message.
pub fn messages_from_value(value: &Value) -> Option<Vec<Message>> {
    value.as_array()?.iter().map(message_from_value).collect()
}

#[derive(Debug, Clone)]
enum ChatEntry {
    Message(Role, PromptTemplate),
    Placeholder(String),
}

/// A list of role-tagged templates plus history placeholders.
#[derive(Debug, Clone, Default)]
pub struct ChatPromptTemplate {
    entries: Vec<ChatEntry>,
}

impl ChatPromptTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(role, template)` pairs.
    pub fn from_messages<I, S>(messages: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = (Role, S)>,
        S: Into<String>,
    {
        messages
            .into_iter()
            .try_fold(Self::new(), |chat, (role, template)| chat.message(role, template))
    }

    /// Append a role-tagged template.
    pub fn message(mut self, role: Role, template: impl Into<String>) -> Result<Self, TemplateError> {
        self.entries
            .push(ChatEntry::Message(role, PromptTemplate::new(template)?));
        Ok(self)
    }

    /// Append a slot filled by the message array found under `key`.
    pub fn placeholder(mut self, key: impl Into<String>) -> Self {
        self.entries.push(ChatEntry::Placeholder(key.into()));
        self
    }

    /// Variables (including placeholder keys) the caller must supply, sorted.
    pub fn input_variables(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|entry| match entry {
                ChatEntry::Message(_, template) => template.input_variables(),
                ChatEntry::Placeholder(key) => vec![key.clone()],
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Render every entry into messages.
    pub fn format_messages(&self, vars: &Map<String, Value>) -> Result<Vec<Message>, TemplateError> {
        let mut messages = Vec::new();
        for entry in &self.entries {
            match entry {
                ChatEntry::Message(role, template) => {
                    messages.push(Message::new(*role, template.format(vars)?));
                }
                ChatEntry::Placeholder(key) => {
                    let history = vars
                        .get(key)
                        .and_then(messages_from_value)
                        .ok_or_else(|| TemplateError::MissingVariable(key.clone()))?;
                    messages.extend(history);
                }
            }
        }
        Ok(messages)
    }

    /// Render as a `Role: content` transcript.
    pub fn format(&self, vars: &Map<String, Value>) -> Result<String, TemplateError> {
        Ok(render_transcript(&self.format_messages(vars)?))
    }
}

#[async_trait]
impl Step for ChatPromptTemplate {
    fn name(&self) -> &str {
        "chat_prompt_template"
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        let vars = variables_from_input(self.name(), input, &self.input_variables())?;
        let messages = self.format_messages(&vars)?;
        serde_json::to_value(messages).map_err(|e| PipelineError::step(self.name(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn formats_placeholders() {
        let prompt = PromptTemplate::new("Tell me a {adjective} joke about {topic}.").unwrap();
        assert_eq!(prompt.input_variables(), vec!["adjective", "topic"]);
        let text = prompt
            .format(&vars(json!({"adjective": "short", "topic": "Rust"})))
            .unwrap();
        assert_eq!(text, "Tell me a short joke about Rust.");
    }

    #[test]
    fn escaped_braces_are_literal() {
        let prompt = PromptTemplate::new(r#"Return {{"order_id": "{id}"}}"#).unwrap();
        assert_eq!(prompt.input_variables(), vec!["id"]);
        let text = prompt.format(&vars(json!({"id": "ORD1"}))).unwrap();
        assert_eq!(text, r#"Return {"order_id": "ORD1"}"#);
    }

    #[test]
    fn missing_variable_is_reported() {
        let prompt = PromptTemplate::new("{a} and {b}").unwrap();
        let err = prompt.format(&vars(json!({"a": 1}))).unwrap_err();
        assert_eq!(err, TemplateError::MissingVariable("b".into()));
    }

    #[test]
    fn malformed_templates_rejected() {
        assert!(matches!(PromptTemplate::new("oops {"), Err(TemplateError::Malformed { .. })));
        assert!(matches!(PromptTemplate::new("oops }"), Err(TemplateError::Malformed { .. })));
        assert!(matches!(PromptTemplate::new("{}"), Err(TemplateError::Malformed { .. })));
    }

    #[test]
    fn partials_fill_variables() {
        let prompt = PromptTemplate::new("{greeting}, {name}").unwrap().partial("greeting", "Hi");
        assert_eq!(prompt.input_variables(), vec!["name"]);
        assert_eq!(prompt.format(&vars(json!({"name": "Ana"}))).unwrap(), "Hi, Ana");
    }

    #[test]
    fn non_string_values_render_as_json() {
        let prompt = PromptTemplate::new("tags: {tags}").unwrap();
        let text = prompt.format(&vars(json!({"tags": ["a", "b"]}))).unwrap();
        assert_eq!(text, r#"tags: ["a","b"]"#);
    }

    #[tokio::test]
    async fn prompt_step_accepts_bare_string_for_single_variable() {
        let prompt = PromptTemplate::new("Translate: {text}").unwrap();
        let out = prompt.invoke(json!("hola")).await.unwrap();
        assert_eq!(out, json!("Translate: hola"));
    }

    #[test]
    fn chat_template_formats_messages() {
        let chat = ChatPromptTemplate::from_messages([
            (Role::System, "You translate to {language}."),
            (Role::User, "{text}"),
        ])
        .unwrap();
        assert_eq!(chat.input_variables(), vec!["language", "text"]);

        let messages = chat
            .format_messages(&vars(json!({"language": "French", "text": "hello"})))
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You translate to French.");
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn placeholder_injects_history() {
        let chat = ChatPromptTemplate::new()
            .message(Role::System, "Be helpful.")
            .unwrap()
            .placeholder("history")
            .message(Role::User, "{input}")
            .unwrap();

        let history = json!([
            {"role": "user", "content": "I am Sam"},
            {"role": "assistant", "content": "Hi Sam"}
        ]);
        let messages = chat
            .format_messages(&vars(json!({"history": history, "input": "Who am I?"})))
            .unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].content, "Hi Sam");
        assert_eq!(messages[3].content, "Who am I?");
    }

    #[test]
    fn chat_format_renders_transcript() {
        let chat = ChatPromptTemplate::from_messages([(Role::User, "{q}")]).unwrap();
        assert_eq!(chat.format(&vars(json!({"q": "hi"}))).unwrap(), "Human: hi");
    }

    #[tokio::test]
    async fn chat_step_outputs_message_array() {
        let chat = ChatPromptTemplate::from_messages([(Role::User, "{q}")]).unwrap();
        let out = chat.invoke(json!({"q": "hi"})).await.unwrap();
        let messages = messages_from_value(&out).unwrap();
        assert_eq!(messages[0].content, "hi");
    }
}
