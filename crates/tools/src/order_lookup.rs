//! Order lookup: finds an order id in free text and reports its status.

use async_trait::async_trait;
use chainloom_core::error::ToolError;
use chainloom_core::tool::Tool;
use regex::Regex;
use std::sync::LazyLock;

/// Returned when no order id is present.
pub const NOT_FOUND: &str = "NOT_FOUND";

static ORDER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ORD\d{10}").expect("order id regex must compile"));

/// First order id (`ORD` followed by ten digits) in `text`.
pub fn extract_order_id(text: &str) -> Option<&str> {
    ORDER_ID_RE.find(text).map(|m| m.as_str())
}

/// Order id or [`NOT_FOUND`].
pub fn order_id_or_not_found(text: &str) -> String {
    extract_order_id(text).unwrap_or(NOT_FOUND).to_string()
}

/// Mock order status keyed off the id's last digit.
pub struct OrderLookupTool;

#[async_trait]
impl Tool for OrderLookupTool {
    fn name(&self) -> &str {
        "order_lookup"
    }

    fn description(&self) -> &str {
        "Look up the status of an order. Input: text containing an order id \
         like ORD1234567890. Returns NOT_FOUND if there is none."
    }

    async fn call(&self, input: &str) -> Result<String, ToolError> {
        let Some(id) = extract_order_id(input) else {
            return Ok(NOT_FOUND.to_string());
        };
        let status = match id.as_bytes()[id.len() - 1] % 3 {
            0 => "in transit, expected within 2 days",
            1 => "delivered",
            _ => "awaiting pickup by the courier",
        };
        Ok(format!("Order {id}: {status}."))
    }
}
