//! Caller-held conversation state for the interactive chat.

use crate::config::LocalChatConfig;
use lc_llm::{ChatMessage, Usage, reasoning_system_message};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    /// Everything after the system message, append-only until `/new`.
    pub history: Vec<ChatMessage>,
    pub usage_totals: Usage,
    pub show_reasoning: bool,
    pub model_override: Option<String>,
    /// `Some(None)` clears the configured effort for this session.
    pub reasoning_override: Option<Option<String>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            history: Vec::new(),
            usage_totals: Usage::default(),
            show_reasoning: false,
            model_override: None,
            reasoning_override: None,
        }
    }

    pub fn reset(&mut self) {
        self.id = Uuid::new_v4();
        self.history.clear();
        self.usage_totals = Usage::default();
    }

    pub fn model<'a>(&'a self, cfg: &'a LocalChatConfig) -> &'a str {
        self.model_override
            .as_deref()
            .unwrap_or(cfg.general.model.as_str())
    }

    pub fn reasoning<'a>(&'a self, cfg: &'a LocalChatConfig) -> Option<&'a str> {
        match &self.reasoning_override {
            Some(v) => v.as_deref(),
            None => cfg.general.reasoning.as_deref(),
        }
    }

    /// System message followed by the history, ready to send.
    pub fn prompt(&self, cfg: &LocalChatConfig) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(reasoning_system_message(
            &cfg.general.system_prompt,
            self.reasoning(cfg),
        ));
        messages.extend(self.history.iter().cloned());
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_llm::Role;

    #[test]
    fn prompt_starts_with_reasoning_system_message() {
        let mut cfg = LocalChatConfig::default();
        cfg.general.reasoning = Some("high".to_string());
        let mut session = Session::new();
        session.history.push(ChatMessage::user("2+2?"));

        let prompt = session.prompt(&cfg);
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, Role::System);
        assert!(prompt[0].content.ends_with("Reasoning: high"));

        session.reasoning_override = Some(None);
        let prompt = session.prompt(&cfg);
        assert!(!prompt[0].content.contains("Reasoning:"));
    }

    #[test]
    fn reset_clears_history_and_usage_but_keeps_overrides() {
        let cfg = LocalChatConfig::default();
        let mut session = Session::new();
        let first_id = session.id;
        session.history.push(ChatMessage::user("hi"));
        session.usage_totals.total_tokens = 10;
        session.model_override = Some("gpt-oss:120b".to_string());

        session.reset();
        assert!(session.history.is_empty());
        assert_eq!(session.usage_totals, Usage::default());
        assert_ne!(session.id, first_id);
        assert_eq!(session.model(&cfg), "gpt-oss:120b");
    }
}
