use crate::error::{LlmError, Result};
use crate::openai::OpenAiCompatClient;
use crate::types::{
    ChatMessage, ChatResponse, ModelInfo, StreamChunk, ToolChoice, ToolDefinition,
};
use futures_util::Stream;
use futures_util::StreamExt;
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const MAX_TOOL_NAME_LEN: usize = 64;

/// Chat-completion client for a locally served, OpenAI-compatible endpoint.
///
/// The client holds no conversation state. Every call is a single request with
/// no retry; the configured timeout is the only time bound.
#[derive(Clone)]
pub struct LlmClient {
    inner: OpenAiCompatClient,
}

impl LlmClient {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self::with_http(http, base_url, api_key)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(timeout_ms = timeout.as_millis() as u64))]
    pub fn with_timeout(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::InvalidInput(format!("http client: {e}")))?;
        Ok(Self::with_http(http, base_url, api_key))
    }

    pub fn with_http(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            inner: OpenAiCompatClient::new(http, base_url, api_key),
        }
    }

    /// One chat-completion exchange.
    ///
    /// Transport failures and non-2xx statuses surface as [`LlmError::Transport`];
    /// bodies that do not parse as a completion surface as
    /// [`LlmError::ResponseFormat`].
    #[tracing::instrument(level = "info", skip_all, fields(model = %model, messages = messages.len(), tools = tools.len()))]
    pub async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
    ) -> Result<ChatResponse> {
        validate_request(model, messages)?;
        let (tools_sanitized, forward, reverse) = sanitize_tools(tools);
        let messages_sanitized = sanitize_messages(messages, &forward);
        let mut resp = self
            .inner
            .chat(model, &messages_sanitized, &tools_sanitized, tool_choice)
            .await?;
        remap_tool_calls_in_response(&mut resp, &reverse);
        tracing::debug!(
            finish_reason = %resp.finish_reason(),
            prompt_tokens = resp.usage.prompt_tokens,
            completion_tokens = resp.usage.completion_tokens,
            tool_calls = resp.message().tool_calls.len(),
            has_reasoning = resp.reasoning().is_some(),
            "chat completion parsed"
        );
        Ok(resp)
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %model, messages = messages.len(), tools = tools.len()))]
    pub async fn complete_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>> {
        validate_request(model, messages)?;
        let (tools_sanitized, forward, reverse) = sanitize_tools(tools);
        let messages_sanitized = sanitize_messages(messages, &forward);
        let stream = self
            .inner
            .chat_stream(model, &messages_sanitized, &tools_sanitized, tool_choice)
            .await?;
        Ok(Box::pin(stream.map(move |chunk| match chunk {
            Ok(StreamChunk::ToolCallStart { id, name }) => Ok(StreamChunk::ToolCallStart {
                id,
                name: reverse.get(&name).cloned().unwrap_or(name),
            }),
            other => other,
        })))
    }

    /// Models installed on the serving endpoint.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.inner.list_models().await
    }
}

fn validate_request(model: &str, messages: &[ChatMessage]) -> Result<()> {
    if model.trim().is_empty() {
        return Err(LlmError::InvalidInput("model must not be empty".to_string()));
    }
    if messages.is_empty() {
        return Err(LlmError::InvalidInput(
            "messages must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Check a tool name against the chat-completions constraint `^[a-zA-Z0-9_-]{1,64}$`.
pub fn validate_tool_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LlmError::InvalidInput("tool name must not be empty".to_string()));
    }
    if name.len() > MAX_TOOL_NAME_LEN {
        return Err(LlmError::InvalidInput(format!(
            "tool name {name:?} exceeds {MAX_TOOL_NAME_LEN} characters"
        )));
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '-'))
    {
        return Err(LlmError::InvalidInput(format!(
            "tool name {name:?} contains invalid character {ch:?}"
        )));
    }
    Ok(())
}

fn sanitize_tools(
    tools: &[ToolDefinition],
) -> (Vec<ToolDefinition>, HashMap<String, String>, HashMap<String, String>) {
    let mut used: HashSet<String> = HashSet::new();
    let mut forward: HashMap<String, String> = HashMap::new(); // original -> sanitized
    let mut reverse: HashMap<String, String> = HashMap::new(); // sanitized -> original
    let mut out = Vec::with_capacity(tools.len());

    for t in tools {
        let base = sanitize_tool_name(&t.name);
        let mut name = base.clone();
        let mut n = 0usize;
        while used.contains(&name) {
            n += 1;
            let suffix = format!("_{n}");
            // Sanitized names are ASCII, so byte truncation is safe.
            let keep = base.len().min(MAX_TOOL_NAME_LEN - suffix.len());
            name = format!("{}{suffix}", &base[..keep]);
        }
        used.insert(name.clone());
        forward.insert(t.name.clone(), name.clone());
        reverse.insert(name.clone(), t.name.clone());
        out.push(ToolDefinition {
            name,
            description: t.description.clone(),
            parameters: t.parameters.clone(),
        });
    }

    (out, forward, reverse)
}

fn remap_tool_calls_in_response(resp: &mut ChatResponse, reverse: &HashMap<String, String>) {
    for choice in resp.choices.iter_mut() {
        for tc in choice.message.tool_calls.iter_mut() {
            if let Some(orig) = reverse.get(&tc.name) {
                tc.name = orig.clone();
            }
        }
    }
}

fn sanitize_messages(
    messages: &[ChatMessage],
    forward: &HashMap<String, String>,
) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| {
            let mut m2 = m.clone();
            for tc in m2.tool_calls.iter_mut() {
                tc.name = match forward.get(&tc.name) {
                    Some(s) => s.clone(),
                    // Calls to tools no longer offered still have to pass server validation.
                    None => sanitize_tool_name(&tc.name),
                };
            }
            m2
        })
        .collect()
}

fn sanitize_tool_name(name: &str) -> String {
    let out: String = name
        .chars()
        .take(MAX_TOOL_NAME_LEN)
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() {
        "tool".to_string()
    } else {
        out
    }
}

/// Compose a system message carrying the free-text `Reasoning: <effort>` directive.
///
/// The effort is passed through verbatim; the server decides what it accepts.
pub fn reasoning_system_message(prompt: &str, effort: Option<&str>) -> ChatMessage {
    let effort = effort.map(str::trim).filter(|e| !e.is_empty());
    let prompt = prompt.trim();
    let content = match (prompt.is_empty(), effort) {
        (true, Some(e)) => format!("Reasoning: {e}"),
        (false, Some(e)) => format!("{prompt}\nReasoning: {e}"),
        (_, None) => prompt.to_string(),
    };
    ChatMessage::system(content)
}
