//! Subcommand implementations.

use crate::assistant::{Assistant, RoundTripOutcome};
use crate::commands::handle_command;
use crate::config::LocalChatConfig;
use crate::session::Session;
use anyhow::Result;
use futures_util::StreamExt;
use lc_llm::{
    ChatMessage, ChatResponse, Choice, FinishReason, PerfStats, StreamChunk, Usage,
    reasoning_system_message,
};
use lc_tools::ToolRegistry;
use std::io::Write;
use std::time::Instant;
use tokio::io::AsyncBufReadExt;

#[derive(Debug, Clone, Copy, Default)]
pub struct AskOptions {
    pub show_reasoning: bool,
    pub stream: bool,
    pub json: bool,
}

fn initial_messages(cfg: &LocalChatConfig, prompt: &str) -> Vec<ChatMessage> {
    vec![
        reasoning_system_message(&cfg.general.system_prompt, cfg.general.reasoning.as_deref()),
        ChatMessage::user(prompt),
    ]
}

pub async fn ask(cfg: &LocalChatConfig, prompt: &str, opts: AskOptions) -> Result<()> {
    let llm = cfg.llm_client()?;
    let messages = initial_messages(cfg, prompt);
    let started = Instant::now();

    if opts.stream {
        let resp = stream_to_stdout(&llm, &cfg.general.model, &messages, opts.show_reasoning)
            .await?;
        eprintln!("\n{}", PerfStats::from_response(&resp, started.elapsed()));
        return Ok(());
    }

    let resp = llm
        .complete(&cfg.general.model, &messages, &[], None)
        .await?;
    let stats = PerfStats::from_response(&resp, started.elapsed());

    if opts.json {
        let out = serde_json::json!({
            "content": resp.message().content,
            "reasoning": resp.reasoning(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if opts.show_reasoning {
        print_reasoning(resp.reasoning());
    }
    println!("{}", resp.message().content);
    eprintln!("\n{stats}");
    Ok(())
}

/// Print the stream as it arrives and reassemble it into a response for stats.
async fn stream_to_stdout(
    llm: &lc_llm::LlmClient,
    model: &str,
    messages: &[ChatMessage],
    show_reasoning: bool,
) -> Result<ChatResponse> {
    let mut stream = llm.complete_stream(model, messages, &[], None).await?;
    let mut content = String::new();
    let mut reasoning = String::new();
    let mut usage = Usage::default();
    let mut finish_reason = None;
    let mut stdout = std::io::stdout();

    while let Some(chunk) = stream.next().await {
        match chunk? {
            StreamChunk::ReasoningDelta { content: r } => {
                if show_reasoning {
                    eprint!("{r}");
                }
                reasoning.push_str(&r);
            }
            StreamChunk::Delta { content: c } => {
                print!("{c}");
                stdout.flush()?;
                content.push_str(&c);
            }
            StreamChunk::ToolCallStart { .. } | StreamChunk::ToolCallDelta { .. } => {}
            StreamChunk::Done {
                usage: u,
                finish_reason: f,
            } => {
                usage = u;
                finish_reason = f;
            }
        }
    }
    println!();

    Ok(ChatResponse {
        id: None,
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            finish_reason: finish_reason
                .unwrap_or_else(|| FinishReason::Other("unknown".to_string())),
            message: ChatMessage {
                reasoning: Some(reasoning).filter(|r| !r.is_empty()),
                ..ChatMessage::assistant(content)
            },
        }],
        usage,
    })
}

fn print_reasoning(reasoning: Option<&str>) {
    match reasoning {
        Some(r) => eprintln!("--- reasoning ---\n{r}\n-----------------"),
        None => eprintln!("(no reasoning trace returned)"),
    }
}

pub async fn tools(
    cfg: &LocalChatConfig,
    prompt: &str,
    max_iterations: usize,
    show_reasoning: bool,
) -> Result<()> {
    let assistant = Assistant::new(
        cfg.llm_client()?,
        ToolRegistry::with_builtins(),
        max_iterations,
    );
    let mut messages = initial_messages(cfg, prompt);
    let started = Instant::now();
    let trip = assistant.run(&cfg.general.model, &mut messages).await?;

    if show_reasoning {
        print_reasoning(trip.final_response().reasoning());
    }
    match &trip.outcome {
        RoundTripOutcome::Completed(resp) => println!("{}", resp.message().content),
        RoundTripOutcome::IterationCapReached { .. } => {
            println!("Tool loop limit reached after {} iterations.", trip.iterations);
        }
    }

    let mut stats = PerfStats::from_response(trip.final_response(), started.elapsed());
    stats.usage = trip.usage;
    eprintln!(
        "\n{stats}\niterations:        {}\ntool_calls:        {}",
        trip.iterations, trip.tool_calls_executed
    );
    Ok(())
}

pub async fn chat(cfg: &LocalChatConfig, with_tools: bool) -> Result<()> {
    let llm = cfg.llm_client()?;
    let registry = if with_tools {
        ToolRegistry::with_builtins()
    } else {
        ToolRegistry::new()
    };
    let assistant = Assistant::new(llm, registry, cfg.tools.max_iterations);
    let mut session = Session::new();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    println!("localchat: model={} (type /help for commands, Ctrl-D to quit)", cfg.general.model);
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }
        if let Some(reply) = handle_command(cfg, &mut session, &line) {
            println!("{reply}");
            continue;
        }

        session.history.push(ChatMessage::user(line.trim()));
        let mut messages = session.prompt(cfg);
        let before = messages.len();
        let model = session.model(cfg).to_string();
        let started = Instant::now();

        match assistant.run(&model, &mut messages).await {
            Ok(trip) => {
                session.history.extend(messages.drain(before..));
                session.usage_totals.add(&trip.usage);
                let resp = trip.final_response();
                if session.show_reasoning {
                    print_reasoning(resp.reasoning());
                }
                match &trip.outcome {
                    RoundTripOutcome::Completed(resp) => println!("{}", resp.message().content),
                    RoundTripOutcome::IterationCapReached { .. } => {
                        println!("Tool loop limit reached.")
                    }
                }
                tracing::info!(
                    session_id = %session.id,
                    latency_ms = started.elapsed().as_millis() as u64,
                    total_tokens = trip.usage.total_tokens,
                    history_messages = session.history.len(),
                    "chat turn completed"
                );
            }
            Err(e) => {
                // Drop the unanswered user turn so the history stays well formed.
                session.history.pop();
                eprintln!("error: {e}");
            }
        }
    }
}

pub async fn models(cfg: &LocalChatConfig) -> Result<()> {
    let llm = cfg.llm_client()?;
    let models = llm.list_models().await?;
    if models.is_empty() {
        println!("no models installed; pull one first, e.g. `ollama pull {}`", cfg.general.model);
        return Ok(());
    }
    for m in models {
        let marker = if m.id == cfg.general.model { "*" } else { " " };
        println!("{marker} {}", m.id);
    }
    Ok(())
}

pub async fn doctor(cfg: &LocalChatConfig) -> Result<()> {
    println!("config: ok");
    println!("base_url: {}", cfg.server.base_url);
    println!("model: {}", cfg.general.model);

    let llm = cfg.llm_client()?;
    let models = llm
        .list_models()
        .await
        .map_err(|e| anyhow::anyhow!("server unreachable at {}: {e}", cfg.server.base_url))?;
    println!("server: ok ({} model(s) installed)", models.len());

    if !models.iter().any(|m| m.id == cfg.general.model) {
        return Err(anyhow::anyhow!(
            "model {} is not installed; run `ollama pull {}`",
            cfg.general.model,
            cfg.general.model
        ));
    }
    println!("model installed: ok");
    Ok(())
}
