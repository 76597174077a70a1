//! LocalChat configuration loader.
//!
//! Precedence: CLI flags > environment > config file > defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalChatConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Local servers accept any non-empty placeholder.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    lc_llm::DEFAULT_BASE_URL.to_string()
}

fn default_api_key() -> String {
    "ollama".to_string()
}

fn default_timeout_secs() -> u64 {
    lc_llm::DEFAULT_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Free text placed after `Reasoning:` in the system message, e.g. `high`.
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            system_prompt: default_system_prompt(),
            reasoning: None,
        }
    }
}

fn default_model() -> String {
    "gpt-oss:20b".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> usize {
    4
}

/// Values supplied on the command line; `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub reasoning: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl LocalChatConfig {
    pub async fn load(path: Option<PathBuf>, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        let explicit = path.is_some();
        let path = match path {
            Some(p) => p,
            None => default_config_path()?,
        };

        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::from_toml(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        cfg.apply_overrides(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("LOCALCHAT_BASE_URL") {
            self.server.base_url = v;
        }
        if let Some(v) = non_empty("LOCALCHAT_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")) {
            self.server.api_key = v;
        }
        if let Some(v) = non_empty("LOCALCHAT_MODEL") {
            self.general.model = v;
        }
        if let Some(v) = non_empty("LOCALCHAT_REASONING") {
            self.general.reasoning = Some(v);
        }
        if let Some(v) = non_empty("LOCALCHAT_TIMEOUT_SECS") {
            match v.trim().parse() {
                Ok(secs) => self.server.timeout_secs = secs,
                Err(e) => tracing::warn!(value = %v, error = %e, "ignoring LOCALCHAT_TIMEOUT_SECS"),
            }
        }
    }

    fn apply_overrides(&mut self, o: &ConfigOverrides) {
        if let Some(v) = o.base_url.clone() {
            self.server.base_url = v;
        }
        if let Some(v) = o.api_key.clone() {
            self.server.api_key = v;
        }
        if let Some(v) = o.model.clone() {
            self.general.model = v;
        }
        if let Some(v) = o.reasoning.clone() {
            self.general.reasoning = Some(v);
        }
        if let Some(v) = o.timeout_secs {
            self.server.timeout_secs = v;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.general.model.trim().is_empty() {
            return Err(anyhow::anyhow!("general.model is required"));
        }
        let base = self.server.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "server.base_url must start with http:// or https://, got {base:?}"
            ));
        }
        if self.server.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "server.api_key must be non-empty (any placeholder works for a local server)"
            ));
        }
        if self.server.timeout_secs == 0 {
            return Err(anyhow::anyhow!("server.timeout_secs must be > 0"));
        }
        if self.tools.max_iterations == 0 {
            return Err(anyhow::anyhow!("tools.max_iterations must be > 0"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }

    pub fn llm_client(&self) -> anyhow::Result<lc_llm::LlmClient> {
        Ok(lc_llm::LlmClient::with_timeout(
            &self.server.base_url,
            &self.server.api_key,
            self.timeout(),
        )?)
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; pass --config explicitly"))?;
    Ok(Path::new(&home).join(".localchat").join("config.toml"))
}
