use crate::error::{Result, ToolError};
use async_trait::async_trait;

pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value>;
}

pub fn to_llm_tool_def(tool: &dyn Tool) -> lc_llm::ToolDefinition {
    let spec = tool.spec();
    lc_llm::ToolDefinition {
        name: spec.name,
        description: spec.description,
        parameters: spec.parameters_schema,
    }
}

pub(crate) fn require_string(args: &serde_json::Value, key: &str) -> Result<String> {
    let Some(v) = args.get(key) else {
        return Err(ToolError::InvalidArguments(format!("missing key: {key}")));
    };
    match v {
        serde_json::Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        serde_json::Value::String(_) => Err(ToolError::InvalidArguments(format!(
            "key {key} must not be empty"
        ))),
        other => Err(ToolError::InvalidArguments(format!(
            "key {key} must be string, got {other:?}"
        ))),
    }
}

pub(crate) fn optional_string(args: &serde_json::Value, key: &str) -> Result<Option<String>> {
    let Some(v) = args.get(key) else {
        return Ok(None);
    };
    match v {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s.clone())),
        other => Err(ToolError::InvalidArguments(format!(
            "key {key} must be string, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_helpers_validate_types() {
        let args = json!({"city": " Paris ", "unit": null, "n": 3});
        assert_eq!(require_string(&args, "city").expect("city"), "Paris");
        assert!(require_string(&args, "missing").is_err());
        assert!(require_string(&args, "n").is_err());
        assert_eq!(optional_string(&args, "unit").expect("unit"), None);
        assert!(optional_string(&args, "n").is_err());
    }
}
