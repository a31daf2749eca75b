//! Built-in demo tools for Chainloom.
//!
//! Every tool takes a string and returns a string. They are offline mocks,
//! deterministic where the output does not depend on the clock.

pub mod current_time;
pub mod order_lookup;
pub mod recommend_drink;
pub mod weather_lookup;

use chainloom_core::error::ToolError;
use chainloom_core::tool::ToolRegistry;
use std::sync::Arc;

pub use current_time::CurrentTimeTool;
pub use order_lookup::{extract_order_id, order_id_or_not_found, OrderLookupTool, NOT_FOUND};
pub use recommend_drink::RecommendDrinkTool;
pub use weather_lookup::WeatherLookupTool;

/// A registry holding every built-in tool.
pub fn default_registry() -> Result<ToolRegistry, ToolError> {
    ToolRegistry::new()
        .with(Arc::new(CurrentTimeTool))?
        .with(Arc::new(WeatherLookupTool))?
        .with(Arc::new(RecommendDrinkTool))?
        .with(Arc::new(OrderLookupTool))
}
