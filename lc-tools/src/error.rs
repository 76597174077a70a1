use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("duplicate tool: {0}")]
    DuplicateTool(String),

    #[error("invalid tool name: {0}")]
    InvalidName(String),
}

impl From<lc_llm::LlmError> for ToolError {
    fn from(e: lc_llm::LlmError) -> Self {
        Self::InvalidName(e.to_string())
    }
}
