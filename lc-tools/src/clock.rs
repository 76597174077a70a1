//! `get_current_time`: wall-clock time in UTC or a fixed offset.

use crate::error::{Result, ToolError};
use crate::traits::{Tool, ToolSpec, optional_string};
use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use serde_json::json;

pub struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_current_time".to_string(),
            description: "Get the current date and time, in UTC or a fixed offset such as +02:00"
                .to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "timezone": {"type": "string", "description": "UTC or an offset like -05:00"}
                }
            }),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let tz = optional_string(&arguments, "timezone")?.unwrap_or_else(|| "UTC".to_string());
        let offset = parse_offset(&tz)?;
        let now = Utc::now().with_timezone(&offset);
        Ok(json!({
            "timezone": tz,
            "iso8601": now.to_rfc3339(),
            "unix_seconds": now.timestamp(),
        }))
    }
}

fn parse_offset(tz: &str) -> Result<FixedOffset> {
    let tz = tz.trim();
    let upper = tz.to_ascii_uppercase();
    let rest = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(upper.as_str());
    if rest.is_empty() || rest == "Z" {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| ToolError::ExecutionFailed("utc offset".to_string()));
    }

    let invalid = || ToolError::InvalidArguments(format!("unsupported timezone {tz:?}"));
    let (sign, digits) = if let Some(d) = rest.strip_prefix('+') {
        (1, d)
    } else if let Some(d) = rest.strip_prefix('-') {
        (-1, d)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 && digits.is_ascii() => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
