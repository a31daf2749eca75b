//! Weather lookup tool: deterministic mock weather data.
//!
//! The same location always yields the same report, so agent turns that use
//! it are reproducible in tests.

use async_trait::async_trait;
use chainloom_core::error::ToolError;
use chainloom_core::tool::Tool;
use serde::Serialize;

/// Location used when the input is blank.
const DEFAULT_LOCATION: &str = "your area";

pub struct WeatherLookupTool;

#[async_trait]
impl Tool for WeatherLookupTool {
    fn name(&self) -> &str {
        "weather_lookup"
    }

    fn description(&self) -> &str {
        "Look up current weather for a location. Input: a city name (optional). \
         Returns conditions, temperature and wind."
    }

    async fn call(&self, input: &str) -> Result<String, ToolError> {
        let location = match input.trim() {
            "" => DEFAULT_LOCATION,
            loc => loc,
        };
        let weather = mock_weather(location);
        serde_json::to_string(&weather)
            .map(|json| format!("{}\n{json}", weather.summary()))
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Serialize)]
struct WeatherReport {
    location: String,
    conditions: &'static str,
    temperature_c: i32,
    wind_level: u32,
    humidity: u32,
}

impl WeatherReport {
    fn summary(&self) -> String {
        format!(
            "Weather in {}: {}, {}°C, wind level {}.",
            self.location, self.conditions, self.temperature_c, self.wind_level
        )
    }
}

/// Weather derived from a hash of the location name.
fn mock_weather(location: &str) -> WeatherReport {
    let hash: u32 = location
        .to_lowercase()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

    let conditions = [
        "Clear skies",
        "Sunny turning cloudy",
        "Partly cloudy",
        "Overcast",
        "Light rain",
        "Thunderstorms",
        "Foggy",
    ];

    WeatherReport {
        location: location.to_string(),
        conditions: conditions[(hash as usize / 7) % conditions.len()],
        temperature_c: (hash % 40) as i32 - 5,
        wind_level: 1 + hash % 6,
        humidity: 30 + hash % 60,
    }
}
