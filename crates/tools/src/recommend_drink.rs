//! Canned nearby-drink suggestions.

use async_trait::async_trait;
use chainloom_core::error::ToolError;
use chainloom_core::tool::Tool;

/// Mock nearby-drink-shop lookup. Input is ignored.
pub struct RecommendDrinkTool;

const NEARBY: &str = "Drink shops within 500 meters:\n\
1. Mixue Ice Cream & Tea\n\
2. Sexy Tea\n\
There is also a convenience store 200 meters away that sells bottled water and other drinks.";

#[async_trait]
impl Tool for RecommendDrinkTool {
    fn name(&self) -> &str {
        "recommend_drink"
    }

    fn description(&self) -> &str {
        "Recommend drink shops near the user. Takes no input."
    }

    async fn call(&self, _input: &str) -> Result<String, ToolError> {
        Ok(NEARBY.to_string())
    }
}
