//! Tool-calling round trip: model call, local tool execution, repeat.

use anyhow::Result;
use lc_llm::{ChatMessage, ChatResponse, LlmClient, ToolCall, ToolChoice, Usage};
use lc_tools::ToolRegistry;
use serde_json::json;
use std::time::Instant;

pub enum RoundTripOutcome {
    /// The model answered without requesting tools.
    Completed(ChatResponse),
    /// The cap was hit while the model was still requesting tools.
    IterationCapReached { last: ChatResponse },
}

pub struct RoundTrip {
    pub outcome: RoundTripOutcome,
    pub iterations: usize,
    pub tool_calls_executed: usize,
    pub usage: Usage,
}

impl RoundTrip {
    pub fn final_response(&self) -> &ChatResponse {
        match &self.outcome {
            RoundTripOutcome::Completed(resp) => resp,
            RoundTripOutcome::IterationCapReached { last } => last,
        }
    }
}

pub struct Assistant {
    llm: LlmClient,
    tools: ToolRegistry,
    max_iterations: usize,
}

impl Assistant {
    pub fn new(llm: LlmClient, tools: ToolRegistry, max_iterations: usize) -> Self {
        Self {
            llm,
            tools,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Drive the conversation until the model stops asking for tools.
    ///
    /// `messages` is extended in place: each assistant turn, then one `tool`
    /// message per tool call in that turn, then the final assistant answer.
    #[tracing::instrument(level = "info", skip_all, fields(model = %model))]
    pub async fn run(&self, model: &str, messages: &mut Vec<ChatMessage>) -> Result<RoundTrip> {
        let tool_defs = self.tools.definitions();
        let mut usage = Usage::default();
        let mut tool_calls_executed = 0usize;
        tracing::info!(
            prior_messages = messages.len(),
            tools_registered = tool_defs.len(),
            max_iterations = self.max_iterations,
            "tool round trip started"
        );

        let mut iteration = 0usize;
        loop {
            iteration += 1;
            let llm_started = Instant::now();
            let response = self
                .llm
                .complete(model, messages, &tool_defs, Some(ToolChoice::Auto))
                .await?;
            usage.add(&response.usage);
            tracing::info!(
                iteration,
                latency_ms = llm_started.elapsed().as_millis() as u64,
                finish_reason = %response.finish_reason(),
                tool_calls = response.message().tool_calls.len(),
                "round trip llm call completed"
            );

            messages.push(response.message().clone());
            if response.message().tool_calls.is_empty() {
                return Ok(RoundTrip {
                    outcome: RoundTripOutcome::Completed(response),
                    iterations: iteration,
                    tool_calls_executed,
                    usage,
                });
            }

            for tool_call in &response.message().tool_calls {
                let content = self.execute_tool_call(tool_call).await;
                messages.push(ChatMessage::tool_result(tool_call.id.clone(), content));
                tool_calls_executed += 1;
            }

            if iteration >= self.max_iterations {
                tracing::warn!(
                    max_iterations = self.max_iterations,
                    "tool round trip iteration cap reached"
                );
                return Ok(RoundTrip {
                    outcome: RoundTripOutcome::IterationCapReached { last: response },
                    iterations: iteration,
                    tool_calls_executed,
                    usage,
                });
            }
        }
    }

    /// Tool failures are reported back to the model, never raised.
    async fn execute_tool_call(&self, tool_call: &ToolCall) -> String {
        tracing::info!(
            tool_call_id = %tool_call.id,
            tool_name = %tool_call.name,
            arguments_len = tool_call.arguments.len(),
            "handling tool call"
        );
        let args = match tool_call.parsed_arguments() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(tool_name = %tool_call.name, error = %e, "invalid tool arguments");
                return json!({ "error": format!("invalid arguments: {e}") }).to_string();
            }
        };

        let started = Instant::now();
        match self.tools.execute(&tool_call.name, args).await {
            Ok(out) => {
                let out = out.to_string();
                tracing::info!(
                    tool_call_id = %tool_call.id,
                    tool_name = %tool_call.name,
                    latency_ms = started.elapsed().as_millis() as u64,
                    output_len = out.len(),
                    "tool call executed"
                );
                out
            }
            Err(e) => {
                tracing::warn!(
                    tool_call_id = %tool_call.id,
                    tool_name = %tool_call.name,
                    error = %e,
                    "tool call failed"
                );
                json!({ "error": e.to_string() }).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::routing::post;
    use lc_llm::{FinishReason, Role};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct Script {
        replies: Arc<Vec<Value>>,
        requests: Arc<Mutex<Vec<Value>>>,
    }

    fn tool_call_reply(calls: Value) -> Value {
        json!({
            "model": "gpt-oss:20b",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {"role": "assistant", "content": "", "tool_calls": calls}
            }],
            "usage": {"prompt_tokens": 100, "completion_tokens": 10, "total_tokens": 110}
        })
    }

    fn stop_reply(content: &str) -> Value {
        json!({
            "model": "gpt-oss:20b",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {"role": "assistant", "content": content}
            }],
            "usage": {"prompt_tokens": 150, "completion_tokens": 20, "total_tokens": 170}
        })
    }

    /// Serves the scripted replies in order, repeating the last one.
    async fn spawn_scripted(replies: Vec<Value>) -> (String, Arc<Mutex<Vec<Value>>>) {
        let script = Script {
            replies: Arc::new(replies),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let requests = script.requests.clone();
        let router = Router::new()
            .route(
                "/v1/chat/completions",
                post(
                    |State(script): State<Script>, Json(body): Json<Value>| async move {
                        let mut requests = script.requests.lock().expect("lock");
                        requests.push(body);
                        let idx = (requests.len() - 1).min(script.replies.len() - 1);
                        Json(script.replies[idx].clone())
                    },
                ),
            )
            .with_state(script);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        (format!("http://{addr}/v1"), requests)
    }

    #[tokio::test]
    async fn appends_one_tool_message_per_call_then_finishes() {
        let (base, requests) = spawn_scripted(vec![
            tool_call_reply(json!([
                {"id": "call_1", "type": "function",
                 "function": {"name": "get_weather", "arguments": "{\"city\":\"New York\"}"}},
                {"id": "call_2", "type": "function",
                 "function": {"name": "calculate", "arguments": "{\"expression\":\"22 * 2\"}"}}
            ])),
            stop_reply("It is 22°C and partly cloudy in New York."),
        ])
        .await;
        let assistant = Assistant::new(
            LlmClient::new(&base, "ollama"),
            ToolRegistry::with_builtins(),
            4,
        );
        let mut messages = vec![ChatMessage::user("What's the weather in New York?")];

        let trip = assistant
            .run("gpt-oss:20b", &mut messages)
            .await
            .expect("round trip");

        assert!(matches!(trip.outcome, RoundTripOutcome::Completed(_)));
        assert_eq!(*trip.final_response().finish_reason(), FinishReason::Stop);
        assert_eq!(trip.iterations, 2);
        assert_eq!(trip.tool_calls_executed, 2);
        assert_eq!(trip.usage.total_tokens, 280);

        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Assistant]
        );
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_2"));
        let weather: Value = serde_json::from_str(&messages[2].content).expect("tool json");
        assert_eq!(weather["city"], json!("New York"));
        let calc: Value = serde_json::from_str(&messages[3].content).expect("tool json");
        assert_eq!(calc["result"], json!(44.0));

        let requests = requests.lock().expect("lock");
        assert_eq!(requests.len(), 2);
        let second = requests[1]["messages"].as_array().expect("messages");
        assert_eq!(second.len(), 4);
        assert_eq!(second[1]["tool_calls"].as_array().expect("calls").len(), 2);
        assert_eq!(second[2]["role"], json!("tool"));
        assert_eq!(second[2]["tool_call_id"], json!("call_1"));
    }

    #[tokio::test]
    async fn tool_failures_are_fed_back_not_raised() {
        let (base, _requests) = spawn_scripted(vec![
            tool_call_reply(json!([
                {"id": "a", "type": "function", "function": {"name": "launch_rocket", "arguments": "{}"}},
                {"id": "b", "type": "function", "function": {"name": "get_weather", "arguments": "{city"}}
            ])),
            stop_reply("Sorry, I could not do that."),
        ])
        .await;
        let assistant = Assistant::new(
            LlmClient::new(&base, "ollama"),
            ToolRegistry::with_builtins(),
            4,
        );
        let mut messages = vec![ChatMessage::user("Launch a rocket to New York")];

        let trip = assistant
            .run("gpt-oss:20b", &mut messages)
            .await
            .expect("round trip");
        assert!(matches!(trip.outcome, RoundTripOutcome::Completed(_)));
        assert!(messages[2].content.contains("unknown tool"));
        assert!(messages[3].content.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn stops_at_iteration_cap() {
        let (base, requests) = spawn_scripted(vec![tool_call_reply(json!([
            {"id": "loop", "type": "function",
             "function": {"name": "get_current_time", "arguments": "{}"}}
        ]))])
        .await;
        let assistant = Assistant::new(
            LlmClient::new(&base, "ollama"),
            ToolRegistry::with_builtins(),
            3,
        );
        let mut messages = vec![ChatMessage::user("What time is it?")];

        let trip = assistant
            .run("gpt-oss:20b", &mut messages)
            .await
            .expect("round trip");
        assert!(matches!(
            trip.outcome,
            RoundTripOutcome::IterationCapReached { .. }
        ));
        assert_eq!(trip.iterations, 3);
        assert_eq!(requests.lock().expect("lock").len(), 3);
        // user + 3 x (assistant + tool)
        assert_eq!(messages.len(), 7);
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let assistant = Assistant::new(
            LlmClient::new(&format!("http://{addr}/v1"), "ollama"),
            ToolRegistry::with_builtins(),
            2,
        );
        let mut messages = vec![ChatMessage::user("hi")];
        let err = assistant
            .run("gpt-oss:20b", &mut messages)
            .await
            .err()
            .expect("must fail");
        let llm_err = err.downcast_ref::<lc_llm::LlmError>().expect("llm error");
        assert!(llm_err.is_transport());
        assert_eq!(messages.len(), 1);
    }
}
