//! Ordered set of tools offered to the model.

use crate::error::{Result, ToolError};
use crate::traits::{Tool, to_llm_tool_def};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in tool.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for tool in crate::builtin_tools() {
            // Built-in names are fixed and distinct.
            if let Err(e) = registry.register(tool) {
                tracing::error!(error = %e, "built-in tool registration failed");
            }
        }
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.spec().name;
        lc_llm::validate_tool_name(&name)?;
        if self.get(&name).is_some() {
            return Err(ToolError::DuplicateTool(name));
        }
        tracing::debug!(tool_name = %name, "tool registered");
        self.tools.push(tool);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.spec().name).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.spec().name == name).cloned()
    }

    pub fn definitions(&self) -> Vec<lc_llm::ToolDefinition> {
        self.tools
            .iter()
            .map(|t| to_llm_tool_def(t.as_ref()))
            .collect()
    }

    #[tracing::instrument(level = "info", skip(self, arguments))]
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let Some(tool) = self.get(name) else {
            return Err(ToolError::UnknownTool(name.to_string()));
        };
        tool.execute(arguments).await
    }
}
