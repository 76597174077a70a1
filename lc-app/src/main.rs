//! LocalChat: talk to a locally served model through its OpenAI-compatible API.

mod assistant;
mod commands;
mod config;
mod init;
mod runner;
mod session;

use clap::{Args, Parser, Subcommand};
use config::{ConfigOverrides, LocalChatConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Parser)]
#[command(name = "localchat", version, about = "Chat with a locally served model")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Config file (default: ~/.localchat/config.toml).
    #[arg(long, global = true, env = "LOCALCHAT_CONFIG")]
    config: Option<PathBuf>,
    /// OpenAI-compatible root, e.g. http://localhost:11434/v1.
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[arg(long, global = true)]
    api_key: Option<String>,
    #[arg(long, short, global = true)]
    model: Option<String>,
    /// Free-text reasoning effort placed in the system message, e.g. high.
    #[arg(long, short, global = true)]
    reasoning: Option<String>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

impl GlobalArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            reasoning: self.reasoning.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send one prompt and print the answer with performance stats.
    Ask {
        prompt: String,
        /// Print the reasoning trace when the model returns one.
        #[arg(long)]
        show_reasoning: bool,
        /// Stream tokens as they are generated.
        #[arg(long)]
        stream: bool,
        /// Print a JSON object instead of text.
        #[arg(long, conflicts_with = "stream")]
        json: bool,
    },
    /// Answer a prompt, letting the model call the built-in tools.
    Tools {
        prompt: String,
        #[arg(long)]
        max_iterations: Option<usize>,
        #[arg(long)]
        show_reasoning: bool,
    },
    /// Interactive chat on stdin.
    Chat {
        /// Offer the built-in tools on every turn.
        #[arg(long)]
        tools: bool,
    },
    /// List models installed on the server.
    Models,
    /// Validate config and check that the server and model are reachable.
    Doctor,
    /// Write a config template to ~/.localchat/config.toml (never overwrites).
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing()?;
    install_panic_hook();

    let cli = Cli::parse();

    if let Command::Init = cli.command {
        return match init::initialize_default().await? {
            init::InitReport::Created(path) => {
                println!("localchat init: wrote {}", path.display());
                Ok(())
            }
            init::InitReport::Kept(path) => {
                println!("localchat init: kept existing {}", path.display());
                Ok(())
            }
        };
    }

    let cfg = LocalChatConfig::load(cli.global.config.clone(), &cli.global.overrides()).await?;
    tracing::debug!(
        base_url = %cfg.server.base_url,
        model = %cfg.general.model,
        reasoning = ?cfg.general.reasoning,
        timeout_secs = cfg.server.timeout_secs,
        "config loaded"
    );

    match cli.command {
        Command::Ask {
            prompt,
            show_reasoning,
            stream,
            json,
        } => {
            let opts = runner::AskOptions {
                show_reasoning,
                stream,
                json,
            };
            runner::ask(&cfg, &prompt, opts).await
        }
        Command::Tools {
            prompt,
            max_iterations,
            show_reasoning,
        } => {
            let max_iterations = max_iterations.unwrap_or(cfg.tools.max_iterations);
            runner::tools(&cfg, &prompt, max_iterations, show_reasoning).await
        }
        Command::Chat { tools } => runner::chat(&cfg, tools).await,
        Command::Models => runner::models(&cfg).await,
        Command::Doctor => runner::doctor(&cfg).await,
        Command::Init => Ok(()),
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new("warn,localchat=info,lc_app=info,lc_llm=info,lc_tools=info"),
    };
    let log_format = std::env::var("LOCALCHAT_LOG_FORMAT")
        .unwrap_or_else(|_| "compact".to_string())
        .to_ascii_lowercase();

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(true)
                .init();
        }
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .pretty()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact()
                .init();
        }
        other => {
            return Err(anyhow::anyhow!(
                "unsupported LOCALCHAT_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }

    tracing::debug!(
        log_format = %log_format,
        env_filter = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_to_string(panic_info.payload());
        tracing::error!(
            panic_location = %location,
            panic_payload = %payload,
            "panic captured"
        );
        default_hook(panic_info);
    }));
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
