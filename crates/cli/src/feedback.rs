//! Customer feedback triage pipeline.
//!
//! ```text
//! text ─▶ {user_input} ─▶ analysis: ┌─ order_id   ─┐ ─▶ report ─▶ reply
//!                                   ├─ sentiment  ─┤
//!                                   ├─ categories ─┤
//!                                   └─ urgency    ─┘
//! ```
//!
//! The analysis branches are keyword heuristics so the pipeline runs
//! offline. The reply is either a filled-in template or, when a reasoner is
//! supplied, the reasoner's answer to a drafting prompt.

use std::sync::Arc;
use chainloom_core::error::PipelineError;
use chainloom_core::reasoner::Reasoner;
use chainloom_pipeline::{
    Assign, FnStep, ModelStep, Parallel, PromptTemplate, Retry, Sequence, Step, StepExt,
    StrOutputParser,
};
use chainloom_tools::order_id_or_not_found;
use serde_json::{json, Map, Value};

const NEGATIVE: &[&str] = &[
    "slow", "late", "broken", "damaged", "terrible", "awful", "worst", "angry", "disappointed",
    "never", "refund", "why", "慢", "差", "坏", "投诉",
];
const POSITIVE: &[&str] = &[
    "great", "thanks", "thank you", "love", "excellent", "fast", "happy", "perfect", "好",
    "满意", "谢谢",
];
const URGENT: &[&str] = &[
    "urgent", "immediately", "right now", "asap", "complaint", "complain", "lawyer", "紧急",
    "立刻", "马上", "投诉",
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("Logistics", &["shipping", "delivery", "courier", "shipped", "slow", "late", "days", "物流", "快递"]),
    ("Product quality", &["broken", "defect", "damaged", "quality", "faulty", "质量"]),
    ("Customer service", &["support", "rude", "service", "agent", "response", "客服"]),
    ("Payment", &["charge", "charged", "payment", "billing", "invoice", "支付", "扣款"]),
    ("Returns and refunds", &["refund", "return", "退货", "退款"]),
];

const REPLY_TEMPLATE: &str = "Dear customer, thank you for reaching out about order {order_id}. \
We have logged your feedback under {category_list} with {urgency} priority and will follow up \
within {sla_hours} hours. {tone} Is there anything else we can help you with?";

const DRAFT_PROMPT: &str = "You are a senior e-commerce support agent. Draft a reply to the customer.\n\
Feedback: {feedback}\n\
Order id: {order_id}\n\
Sentiment: {sentiment} (confidence {confidence})\n\
Categories: {category_list}\n\
Urgency: {urgency} (respond within {sla_hours} hours)\n\
{key_phrases_section}\n\
Match the tone to the sentiment, mention the order id and the categories, state the timeline, \
and end by asking whether there is anything else.";

fn user_input(step: &str, input: &Value) -> Result<String, PipelineError> {
    match input.get("user_input") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(PipelineError::invalid_input(step, "string", other)),
        None => Err(PipelineError::missing_key(step, "user_input")),
    }
}

fn matches<'a>(text: &str, words: &[&'a str]) -> Vec<&'a str> {
    words.iter().copied().filter(|w| text.contains(w)).collect()
}

/// `{"sentiment", "confidence", "key_phrases"}`
pub fn analyze_sentiment(text: &str) -> Value {
    let lower = text.to_lowercase();
    let negative = matches(&lower, NEGATIVE);
    let positive = matches(&lower, POSITIVE);
    let score = positive.len() as i64 - negative.len() as i64;

    let sentiment = match score {
        s if s > 0 => "POSITIVE",
        s if s < 0 => "NEGATIVE",
        _ => "NEUTRAL",
    };
    let confidence = (0.6 + 0.1 * score.unsigned_abs() as f64).min(0.95);
    let key_phrases: Vec<&str> = negative.iter().chain(positive.iter()).take(3).copied().collect();

    json!({
        "sentiment": sentiment,
        "confidence": (confidence * 100.0).round() / 100.0,
        "key_phrases": key_phrases,
    })
}

/// `{"categories": [...]}`: the one or two best-matching categories.
pub fn classify_issue(text: &str) -> Value {
    let lower = text.to_lowercase();
    let mut scored: Vec<(&str, usize)> = CATEGORIES
        .iter()
        .map(|(name, words)| (*name, matches(&lower, words).len()))
        .filter(|(_, hits)| *hits > 0)
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let categories: Vec<&str> = if scored.is_empty() {
        vec!["Other"]
    } else {
        scored.into_iter().take(2).map(|(name, _)| name).collect()
    };
    json!({ "categories": categories })
}

/// `{"urgency", "sla_hours", "reason"}`
pub fn assess_priority(text: &str) -> Value {
    let lower = text.to_lowercase();
    let urgent = matches(&lower, URGENT);
    if !urgent.is_empty() {
        return json!({
            "urgency": "HIGH",
            "sla_hours": 4,
            "reason": format!("mentions '{}'", urgent[0]),
        });
    }
    if !matches(&lower, NEGATIVE).is_empty() {
        return json!({
            "urgency": "MEDIUM",
            "sla_hours": 24,
            "reason": "expresses dissatisfaction without an immediate demand",
        });
    }
    json!({ "urgency": "LOW", "sla_hours": 72, "reason": "general feedback" })
}

fn text_branch(name: &'static str, f: fn(&str) -> Value) -> FnStep {
    FnStep::new(name, move |input| Ok(f(&user_input(name, &input)?)))
}

/// The four analysis branches run side by side on `{"user_input": ...}`.
pub fn analysis_step() -> Result<Parallel, PipelineError> {
    Parallel::new("analysis")
        .branch(
            "order_id",
            text_branch("order_id", |t| json!({ "order_id": order_id_or_not_found(t) })),
        )?
        .branch("sentiment", text_branch("sentiment", analyze_sentiment))?
        .branch("categories", text_branch("categories", classify_issue))?
        .branch("urgency", text_branch("urgency", assess_priority))
}

fn field<'a>(step: &str, value: &'a Value, path: &[&str]) -> Result<&'a Value, PipelineError> {
    path.iter().try_fold(value, |v, key| {
        v.get(key)
            .ok_or_else(|| PipelineError::missing_key(step, path.join(".")))
    })
}

/// Flatten `{user_input, analysis}` into the report the reply is built from.
fn report(input: Value) -> Result<Value, PipelineError> {
    const STEP: &str = "report";
    let sentiment = field(STEP, &input, &["analysis", "sentiment", "sentiment"])?.clone();
    let key_phrases = input
        .pointer("/analysis/sentiment/key_phrases")
        .cloned()
        .unwrap_or_else(|| json!([]));
    let phrases: Vec<&str> = key_phrases
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let categories = field(STEP, &input, &["analysis", "categories", "categories"])?.clone();
    let category_list = categories
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(", "))
        .unwrap_or_default();

    let tone = if sentiment == "NEGATIVE" {
        "We are sorry for the trouble and are working on a fix."
    } else if sentiment == "POSITIVE" {
        "We are glad to hear it and appreciate your kind words."
    } else {
        "We appreciate you taking the time to tell us."
    };

    let key_phrases_section = if phrases.is_empty() {
        String::new()
    } else {
        format!("Key points: {}", phrases.join(", "))
    };
    let confidence = input
        .pointer("/analysis/sentiment/confidence")
        .cloned()
        .unwrap_or_else(|| json!(0.8));
    let urgency_reason = input
        .pointer("/analysis/urgency/reason")
        .cloned()
        .unwrap_or_else(|| json!(""));

    Ok(json!({
        "feedback": field(STEP, &input, &["user_input"])?,
        "order_id": field(STEP, &input, &["analysis", "order_id", "order_id"])?,
        "sentiment": sentiment,
        "confidence": confidence,
        "key_phrases": key_phrases,
        "key_phrases_section": key_phrases_section,
        "categories": categories,
        "category_list": category_list,
        "urgency": field(STEP, &input, &["analysis", "urgency", "urgency"])?,
        "sla_hours": field(STEP, &input, &["analysis", "urgency", "sla_hours"])?,
        "urgency_reason": urgency_reason,
        "tone": tone,
    }))
}

/// Builds the full triage pipeline. The output is the report object with
/// a `reply` key added.
///
/// Accepts the feedback text or `{"user_input": text}`.
pub fn feedback_pipeline(reasoner: Option<Arc<dyn Reasoner>>) -> Result<Sequence, PipelineError> {
    let normalize = FnStep::new("normalize", |input| match input {
        Value::String(text) => Ok(json!({ "user_input": text })),
        Value::Object(map) if map.contains_key("user_input") => Ok(Value::Object(map)),
        Value::Object(_) => Err(PipelineError::missing_key("normalize", "user_input")),
        other => Err(PipelineError::invalid_input("normalize", "string or object", &other)),
    });

    let reply: Arc<dyn Step> = match reasoner {
        None => PromptTemplate::new(REPLY_TEMPLATE)?.boxed(),
        Some(reasoner) => Arc::new(
            PromptTemplate::new(DRAFT_PROMPT)?
                .pipe(Retry::new(ModelStep::new(reasoner), 3))
                .pipe(StrOutputParser)
                .named("draft_reply"),
        ),
    };

    Ok(Sequence::new("feedback")
        .then(normalize)
        .then(Assign::new("analyze").field("analysis", analysis_step()?)?)
        .then(FnStep::new("report", report))
        .then(Assign::new("reply").field("reply", reply)?))
}

/// Run the triage pipeline on one piece of feedback and return the report.
pub async fn triage(
    text: &str,
    reasoner: Option<Arc<dyn Reasoner>>,
) -> chainloom_core::Result<Map<String, Value>> {
    match feedback_pipeline(reasoner)?.invoke(Value::String(text.to_string())).await? {
        Value::Object(report) => Ok(report),
        other => Err(PipelineError::invalid_input("feedback", "object", &other).into()),
    }
}

/// Render a report as human-readable lines.
pub fn render_report(report: &Map<String, Value>) -> String {
    let get = |key: &str| match report.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    format!(
        "Order:      {}\nSentiment:  {} ({})\nCategories: {}\nUrgency:    {} (respond within {}h, {})\n\nReply:\n{}",
        get("order_id"),
        get("sentiment"),
        get("confidence"),
        get("category_list"),
        get("urgency"),
        get("sla_hours"),
        get("urgency_reason"),
        get("reply"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_delivery_is_negative_logistics() {
        let text = "Order ORD1234567890, why is the delivery so slow? It has been 10 days!";
        assert_eq!(analyze_sentiment(text)["sentiment"], "NEGATIVE");
        assert_eq!(classify_issue(text)["categories"][0], "Logistics");
        assert_eq!(assess_priority(text)["urgency"], "MEDIUM");
    }

    #[test]
    fn urgent_words_raise_priority() {
        let p = assess_priority("Please fix this immediately or I will file a complaint");
        assert_eq!(p["urgency"], "HIGH");
        assert_eq!(p["sla_hours"], 4);
    }

    #[test]
    fn praise_is_positive_and_low_priority() {
        let text = "Great product, thanks for the fast shipping";
        assert_eq!(analyze_sentiment(text)["sentiment"], "POSITIVE");
        assert_eq!(assess_priority(text)["urgency"], "LOW");
    }

    #[test]
    fn unmatched_text_is_other() {
        assert_eq!(classify_issue("hello there")["categories"], json!(["Other"]));
    }

    #[test]
    fn at_most_two_categories() {
        let text = "refund please, the item arrived broken and shipping was late, support was rude";
        let cats = classify_issue(text);
        assert_eq!(cats["categories"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn chinese_feedback_is_understood() {
        let text = "订单号：ORD1234567890，物流为什么这么慢，这都10天了？";
        assert_eq!(analyze_sentiment(text)["sentiment"], "NEGATIVE");
        assert_eq!(classify_issue(text)["categories"][0], "Logistics");
    }

    #[tokio::test]
    async fn triage_returns_the_report() {
        let report = triage("Thanks, great service!", None).await.unwrap();
        assert_eq!(report["sentiment"], "POSITIVE");
        assert!(render_report(&report).contains("Sentiment:  POSITIVE"));
    }

    /// Asks for a tool, which a plain model step refuses.
    struct ToolHungry;

    #[async_trait::async_trait]
    impl Reasoner for ToolHungry {
        fn name(&self) -> &str {
            "tool_hungry"
        }

        async fn reason(
            &self,
            _request: chainloom_core::reasoner::ReasoningRequest,
        ) -> Result<chainloom_core::reasoner::ReasoningResponse, chainloom_core::error::ReasonerError>
        {
            Ok(chainloom_core::reasoner::ReasoningResponse::tool_call("current_time", ""))
        }
    }

    #[tokio::test]
    async fn triage_surfaces_pipeline_failures() {
        let err = triage("where is ORD1234567890", Some(Arc::new(ToolHungry)))
            .await
            .unwrap_err();
        assert!(matches!(err, chainloom_core::Error::Pipeline(_)));
    }

    #[tokio::test]
    async fn pipeline_produces_report_and_reply() {
        let pipeline = feedback_pipeline(None).unwrap();
        let out = pipeline
            .invoke(json!("Order ORD1234567890 is late, the delivery is so slow"))
            .await
            .unwrap();

        assert_eq!(out["order_id"], "ORD1234567890");
        assert_eq!(out["sentiment"], "NEGATIVE");
        let reply = out["reply"].as_str().unwrap();
        assert!(reply.contains("ORD1234567890"));
        assert!(reply.contains("Logistics"));
        assert!(reply.contains("24 hours"));
    }

    #[tokio::test]
    async fn missing_order_id_is_not_found() {
        let pipeline = feedback_pipeline(None).unwrap();
        let out = pipeline
            .invoke(json!({ "user_input": "Love it, thanks!" }))
            .await
            .unwrap();
        assert_eq!(out["order_id"], "NOT_FOUND");
        assert_eq!(out["urgency"], "LOW");
    }

    #[tokio::test]
    async fn object_without_user_input_is_rejected() {
        let pipeline = feedback_pipeline(None).unwrap();
        let err = pipeline.invoke(json!({ "text": "hi" })).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingKey { .. }));
    }

    #[test]
    fn report_renders_lines() {
        let mut map = Map::new();
        map.insert("order_id".into(), json!("ORD0000000001"));
        map.insert("reply".into(), json!("Hello"));
        let text = render_report(&map);
        assert!(text.starts_with("Order:      ORD0000000001"));
        assert!(text.ends_with("Hello"));
    }
}
