//! Slash-command parser for the interactive chat.

use crate::config::LocalChatConfig;
use crate::session::Session;

const HELP: &str =
    "Supported: /new /status /usage /think /reasoning [effort|clear] /model [name|clear] /help";

/// Returns `None` when the input is a message for the model.
pub fn handle_command(cfg: &LocalChatConfig, session: &mut Session, input: &str) -> Option<String> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());

    match command {
        "/new" => {
            session.reset();
            Some("Session reset.".to_string())
        }
        "/think" => {
            session.show_reasoning = !session.show_reasoning;
            Some(format!("show_reasoning = {}", session.show_reasoning))
        }
        "/usage" => Some(format!(
            "prompt_tokens={} completion_tokens={} total_tokens={}",
            session.usage_totals.prompt_tokens,
            session.usage_totals.completion_tokens,
            session.usage_totals.total_tokens
        )),
        "/reasoning" => Some(handle_reasoning(cfg, session, arg)),
        "/model" => Some(handle_model(cfg, session, arg)),
        "/status" => Some(format!(
            "session={}\nmodel={}\nreasoning={}\nbase_url={}\nhistory_messages={}",
            session.id,
            session.model(cfg),
            session.reasoning(cfg).unwrap_or("(none)"),
            cfg.server.base_url,
            session.history.len()
        )),
        "/help" => Some(HELP.to_string()),
        _ => Some(format!("Unknown command. {HELP}")),
    }
}

fn handle_reasoning(cfg: &LocalChatConfig, session: &mut Session, arg: Option<&str>) -> String {
    match arg {
        None => format!("reasoning={}", session.reasoning(cfg).unwrap_or("(none)")),
        Some(a) if matches!(a.to_ascii_lowercase().as_str(), "clear" | "off" | "none") => {
            session.reasoning_override = Some(None);
            "reasoning directive removed".to_string()
        }
        Some("default") => {
            session.reasoning_override = None;
            format!(
                "reasoning reset to configured value {}",
                cfg.general.reasoning.as_deref().unwrap_or("(none)")
            )
        }
        Some(effort) => {
            session.reasoning_override = Some(Some(effort.to_string()));
            format!("reasoning set to {effort}")
        }
    }
}

fn handle_model(cfg: &LocalChatConfig, session: &mut Session, arg: Option<&str>) -> String {
    match arg {
        None => format!(
            "active_model={}\ndefault_model={}",
            session.model(cfg),
            cfg.general.model
        ),
        Some(a) if matches!(a.to_ascii_lowercase().as_str(), "clear" | "reset" | "unset") => {
            session.model_override = None;
            format!(
                "model override cleared; using default model {}",
                cfg.general.model
            )
        }
        Some(name) => {
            session.model_override = Some(name.to_string());
            format!("model override set to {name}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_llm::ChatMessage;

    #[test]
    fn plain_text_is_not_a_command() {
        let cfg = LocalChatConfig::default();
        let mut session = Session::new();
        assert!(handle_command(&cfg, &mut session, "2+2?").is_none());
    }

    #[test]
    fn new_clears_history() {
        let cfg = LocalChatConfig::default();
        let mut session = Session::new();
        session.history.push(ChatMessage::user("hi"));
        assert_eq!(
            handle_command(&cfg, &mut session, "/new").as_deref(),
            Some("Session reset.")
        );
        assert!(session.history.is_empty());
    }

    #[test]
    fn reasoning_effort_is_stored_verbatim() {
        let cfg = LocalChatConfig::default();
        let mut session = Session::new();
        handle_command(&cfg, &mut session, "/reasoning High");
        assert_eq!(session.reasoning(&cfg), Some("High"));
        handle_command(&cfg, &mut session, "/reasoning clear");
        assert_eq!(session.reasoning(&cfg), None);
        handle_command(&cfg, &mut session, "/reasoning default");
        assert_eq!(session.reasoning_override, None);
    }

    #[test]
    fn model_override_set_and_cleared() {
        let cfg = LocalChatConfig::default();
        let mut session = Session::new();
        handle_command(&cfg, &mut session, "/model gpt-oss:120b");
        assert_eq!(session.model(&cfg), "gpt-oss:120b");
        handle_command(&cfg, &mut session, "/model clear");
        assert_eq!(session.model(&cfg), "gpt-oss:20b");
    }

    #[test]
    fn unknown_command_lists_help() {
        let cfg = LocalChatConfig::default();
        let mut session = Session::new();
        let out = handle_command(&cfg, &mut session, "/bogus").expect("handled");
        assert!(out.starts_with("Unknown command."));
    }
}
