use crate::error::{LlmError, Result};
use crate::types::{
    ChatMessage, ChatResponse, Choice, FinishReason, ModelInfo, Role, StreamChunk, ToolCall,
    ToolChoice, ToolDefinition, Usage,
};
use bytes::Bytes;
use futures_util::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;

/// Wire-level client for an OpenAI-compatible `/v1` root.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %model))]
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
    ) -> Result<ChatResponse> {
        let req = ChatCompletionRequest::new(model, messages, tools, tool_choice, false);

        let response = self
            .http
            .post(self.chat_completions_url())
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::from_status(status, &body));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
        parsed.into_chat_response(model)
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %model))]
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>> {
        let req = ChatCompletionRequest::new(model, messages, tools, tool_choice, true);

        let response = self
            .http
            .post(self.chat_completions_url())
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, &body));
        }

        let sse = Box::pin(decode_sse(response.bytes_stream()));
        let stream = futures_util::stream::unfold(
            (sse, StreamState::default()),
            |(mut sse, mut state)| async move {
                loop {
                    if let Some(chunk) = state.pending.pop_front() {
                        return Some((Ok(chunk), (sse, state)));
                    }
                    if state.done {
                        return None;
                    }
                    match sse.as_mut().next().await? {
                        Ok(SseEvent::Data(data)) => {
                            if data.trim() == "[DONE]" {
                                state.finish();
                                continue;
                            }
                            let chunk: StreamResponseChunk = match serde_json::from_str(&data) {
                                Ok(v) => v,
                                Err(e) => {
                                    return Some((
                                        Err(LlmError::StreamParse(format!(
                                            "chunk json error={e} data={data}"
                                        ))),
                                        (sse, state),
                                    ));
                                }
                            };
                            state.absorb(chunk);
                        }
                        Ok(SseEvent::Other) => continue,
                        Err(e) => return Some((Err(e), (sse, state))),
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .http
            .get(self.models_url())
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::from_status(status, &body));
        }

        let parsed: ModelList = serde_json::from_str(&body)?;
        Ok(parsed
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                owned_by: m.owned_by,
            })
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

impl ChatCompletionRequest {
    fn new(
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
        stream: bool,
    ) -> Self {
        let mut out = Self {
            model: model.to_string(),
            messages: messages.iter().map(to_wire_message).collect(),
            tools: tools.iter().map(to_wire_tool).collect(),
            tool_choice: None,
            stream: None,
            stream_options: None,
        };

        if !out.tools.is_empty() {
            out.tool_choice = Some(tool_choice.unwrap_or(ToolChoice::Auto));
        }

        if stream {
            out.stream = Some(true);
            out.stream_options = Some(StreamOptions {
                include_usage: true,
            });
        }

        out
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    r#type: String,
    function: WireToolFunction,
}

#[derive(Debug, Serialize)]
struct WireToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

fn to_wire_tool(t: &ToolDefinition) -> WireTool {
    WireTool {
        r#type: "function".to_string(),
        function: WireToolFunction {
            name: t.name.clone(),
            description: t.description.clone(),
            parameters: t.parameters.clone(),
        },
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    r#type: String,
    function: WireToolFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireToolFunctionCall {
    name: String,
    arguments: String,
}

fn to_wire_message(m: &ChatMessage) -> WireMessage {
    // Assistant turns that only carry tool calls go out without a content field.
    let content = if m.role == Role::Assistant && !m.tool_calls.is_empty() {
        Some(m.content.clone()).filter(|s| !s.is_empty())
    } else {
        Some(m.content.clone())
    };
    WireMessage {
        role: m.role.as_str(),
        content,
        tool_calls: m
            .tool_calls
            .iter()
            .map(|tc| WireToolCall {
                id: tc.id.clone(),
                r#type: "function".to_string(),
                function: WireToolFunctionCall {
                    name: tc.name.clone(),
                    arguments: tc.arguments.clone(),
                },
            })
            .collect(),
        tool_call_id: m.tool_call_id.clone(),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    index: Option<u32>,
    message: WireChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "reasoning_content")]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireChoiceToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireChoiceToolCall {
    id: String,
    #[serde(default)]
    function: WireChoiceToolCallFunction,
}

#[derive(Debug, Deserialize, Default)]
struct WireChoiceToolCallFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u
                .total_tokens
                .unwrap_or(u.prompt_tokens.saturating_add(u.completion_tokens)),
        }
    }
}

impl ChatCompletionResponse {
    fn into_chat_response(self, requested_model: &str) -> Result<ChatResponse> {
        if self.choices.is_empty() {
            return Err(LlmError::ResponseFormat(
                "chat completion response has no choices".to_string(),
            ));
        }

        let choices = self
            .choices
            .into_iter()
            .enumerate()
            .map(|(pos, choice)| {
                let tool_calls: Vec<ToolCall> = choice
                    .message
                    .tool_calls
                    .into_iter()
                    .map(|tc| ToolCall {
                        id: tc.id,
                        name: tc.function.name,
                        arguments: tc.function.arguments,
                    })
                    .collect();
                let finish_reason = match choice.finish_reason {
                    Some(v) => FinishReason::from(v),
                    None if !tool_calls.is_empty() => FinishReason::ToolCalls,
                    None => FinishReason::Other("unknown".to_string()),
                };
                Choice {
                    index: choice.index.unwrap_or(pos as u32),
                    finish_reason,
                    message: ChatMessage {
                        role: Role::Assistant,
                        content: choice.message.content.unwrap_or_default(),
                        tool_calls,
                        tool_call_id: None,
                        reasoning: choice.message.reasoning.filter(|r| !r.is_empty()),
                    },
                }
            })
            .collect();

        Ok(ChatResponse {
            id: self.id,
            model: self
                .model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| requested_model.to_string()),
            choices,
            usage: self.usage.map(Usage::from).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
}

#[derive(Debug)]
enum SseEvent {
    Data(String),
    Other,
}

fn decode_sse<S>(bytes_stream: S) -> impl Stream<Item = Result<SseEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    // Raw bytes are buffered so a multibyte character split across reads
    // is only decoded once its event is complete.
    futures_util::stream::unfold(
        (bytes_stream, Vec::<u8>::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                if let Some(idx) = find_event_boundary(&buffer) {
                    let raw: Vec<u8> = buffer.drain(..idx + 2).take(idx).collect();
                    return Some((decode_event(&raw), (stream, buffer)));
                }

                match stream.next().await {
                    Some(Ok(chunk)) => {
                        // CR only appears in line endings; JSON escapes it inside strings.
                        buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
                        continue;
                    }
                    Some(Err(e)) => return Some((Err(e.into()), (stream, buffer))),
                    None => {
                        // Flush a trailing event the server did not terminate.
                        if buffer.iter().all(u8::is_ascii_whitespace) {
                            return None;
                        }
                        let raw = std::mem::take(&mut buffer);
                        return Some((decode_event(&raw), (stream, buffer)));
                    }
                }
            }
        },
    )
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn decode_event(raw: &[u8]) -> Result<SseEvent> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| LlmError::StreamParse(format!("event is not valid utf-8: {e}")))?;
    Ok(parse_sse_event(text))
}

fn parse_sse_event(raw: &str) -> SseEvent {
    let data_lines: Vec<&str> = raw
        .lines()
        .map(str::trim_end)
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();
    if data_lines.is_empty() {
        return SseEvent::Other;
    }
    SseEvent::Data(data_lines.join("\n"))
}

#[derive(Debug, Deserialize)]
struct StreamResponseChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "reasoning_content")]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamDeltaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamDeltaToolCall {
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamDeltaToolFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamDeltaToolFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct StreamToolCallState {
    id: Option<String>,
    name: Option<String>,
    started: bool,
    /// Argument fragments seen before the id and name were both known.
    buffered_arguments: String,
}

#[derive(Debug, Default)]
struct StreamState {
    tool_calls: HashMap<u32, StreamToolCallState>,
    usage: Option<Usage>,
    finish_reason: Option<FinishReason>,
    pending: VecDeque<StreamChunk>,
    done: bool,
}

impl StreamState {
    fn absorb(&mut self, chunk: StreamResponseChunk) {
        if let Some(u) = chunk.usage {
            self.usage = Some(u.into());
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return;
        };
        if let Some(fr) = choice.finish_reason {
            self.finish_reason = Some(FinishReason::from(fr));
        }

        let delta = choice.delta;
        if let Some(reasoning) = delta.reasoning.filter(|s| !s.is_empty()) {
            self.pending
                .push_back(StreamChunk::ReasoningDelta { content: reasoning });
        }
        if let Some(content) = delta.content.filter(|s| !s.is_empty()) {
            self.pending.push_back(StreamChunk::Delta { content });
        }

        for tc in delta.tool_calls.unwrap_or_default() {
            let idx = tc.index.unwrap_or(0);
            let entry = self.tool_calls.entry(idx).or_default();
            if entry.id.is_none() {
                entry.id = tc.id.clone();
            }
            let (name, arguments) = match tc.function {
                Some(f) => (f.name, f.arguments.unwrap_or_default()),
                None => (None, String::new()),
            };
            if entry.name.is_none() {
                entry.name = name;
            }

            if !entry.started {
                entry.buffered_arguments.push_str(&arguments);
                let (Some(id), Some(name)) = (entry.id.clone(), entry.name.clone()) else {
                    continue;
                };
                entry.started = true;
                self.pending
                    .push_back(StreamChunk::ToolCallStart { id, name });
                let buffered = std::mem::take(&mut entry.buffered_arguments);
                if !buffered.is_empty() {
                    self.pending
                        .push_back(StreamChunk::ToolCallDelta { arguments: buffered });
                }
                continue;
            }

            if !arguments.is_empty() {
                self.pending
                    .push_back(StreamChunk::ToolCallDelta { arguments });
            }
        }
    }

    fn finish(&mut self) {
        self.pending.push_back(StreamChunk::Done {
            usage: self.usage.unwrap_or_default(),
            finish_reason: self.finish_reason.clone(),
        });
        self.done = true;
    }
}
