//! Chat-completion client for locally served models behind an OpenAI-compatible API.
//!
//! Pure HTTP client: the serving process is started and managed elsewhere.

mod client;
mod error;
mod openai;
mod stats;
mod types;

pub use client::{
    DEFAULT_BASE_URL, DEFAULT_TIMEOUT, LlmClient, reasoning_system_message, validate_tool_name,
};
pub use error::{LlmError, Result};
pub use stats::PerfStats;
pub use types::{
    ChatMessage, ChatResponse, Choice, FinishReason, ModelInfo, Role, StreamChunk, ToolCall,
    ToolChoice, ToolDefinition, Usage,
};
