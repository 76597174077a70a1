//! `get_weather`: offline, deterministic readings for demos and tests.

use crate::error::{Result, ToolError};
use crate::traits::{Tool, ToolSpec, optional_string, require_string};
use async_trait::async_trait;
use serde_json::json;

const KNOWN_CITIES: &[(&str, f64, &str)] = &[
    ("new york", 22.0, "partly cloudy"),
    ("london", 14.0, "light rain"),
    ("paris", 18.0, "sunny"),
    ("tokyo", 26.0, "humid"),
    ("san francisco", 16.0, "fog"),
];

const CONDITIONS: &[&str] = &["sunny", "cloudy", "light rain", "windy", "clear"];

pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_weather".to_string(),
            description: "Get the current weather in a given city".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "city": {"type": "string", "description": "City name, e.g. New York"},
                    "unit": {"type": "string", "enum": ["celsius", "fahrenheit"]}
                },
                "required": ["city"]
            }),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let city = require_string(&arguments, "city")?;
        let unit = optional_string(&arguments, "unit")?.unwrap_or_else(|| "celsius".to_string());
        let (celsius, conditions) = reading_for(&city);
        let temperature = match unit.to_ascii_lowercase().as_str() {
            "celsius" | "c" => celsius,
            "fahrenheit" | "f" => celsius * 9.0 / 5.0 + 32.0,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "unit must be celsius or fahrenheit, got {other:?}"
                )));
            }
        };
        Ok(json!({
            "city": city,
            "temperature": (temperature * 10.0).round() / 10.0,
            "unit": unit.to_ascii_lowercase(),
            "conditions": conditions,
        }))
    }
}

fn reading_for(city: &str) -> (f64, &'static str) {
    let key = city.to_ascii_lowercase();
    if let Some((_, temp, conditions)) = KNOWN_CITIES.iter().find(|(name, _, _)| *name == key) {
        return (*temp, conditions);
    }
    let seed: u32 = key.bytes().map(u32::from).sum();
    let temp = f64::from(seed % 30) + 5.0;
    (temp, CONDITIONS[(seed as usize) % CONDITIONS.len()])
}
