//! Configuration scaffolding for `localchat init`.
//!
//! Writes `~/.localchat/config.toml` from the repository template without
//! overwriting an existing file.

use anyhow::Result;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";
const CONFIG_TEMPLATE: &str = include_str!("../../config-templates/config.toml");

#[derive(Debug, Clone)]
pub enum InitReport {
    Created(PathBuf),
    Kept(PathBuf),
}

pub async fn initialize_default() -> Result<InitReport> {
    let config_path = crate::config::default_config_path()?;
    let root = config_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid default config path: {}", config_path.display()))?
        .to_path_buf();
    initialize_at_root(&root).await
}

pub async fn initialize_at_root(root: &Path) -> Result<InitReport> {
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| anyhow::anyhow!("create config root {}: {e}", root.display()))?;

    let target = root.join(CONFIG_FILE);
    match tokio::fs::metadata(&target).await {
        Ok(_) => Ok(InitReport::Kept(target)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::write(&target, CONFIG_TEMPLATE)
                .await
                .map_err(|e| anyhow::anyhow!("write config template {}: {e}", target.display()))?;
            tracing::info!(path = %target.display(), "config template written");
            Ok(InitReport::Created(target))
        }
        Err(err) => Err(anyhow::anyhow!(
            "inspect config path {}: {err}",
            target.display()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{InitReport, initialize_at_root};
    use std::path::PathBuf;
    use uuid::Uuid;

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("localchat-init-{name}-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn init_writes_template_when_missing() {
        let root = temp_root("create");
        let report = initialize_at_root(&root).await.expect("init succeeds");
        let InitReport::Created(path) = report else {
            panic!("expected template to be created");
        };
        let written = std::fs::read_to_string(&path).expect("read template");
        assert!(written.contains("gpt-oss:20b"));

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn init_never_overwrites() {
        let root = temp_root("keep");
        std::fs::create_dir_all(&root).expect("mkdir");
        std::fs::write(root.join("config.toml"), "[general]\nmodel = \"mine\"\n").expect("seed");

        let report = initialize_at_root(&root).await.expect("init succeeds");
        assert!(matches!(report, InitReport::Kept(_)));
        let kept = std::fs::read_to_string(root.join("config.toml")).expect("read");
        assert!(kept.contains("mine"));

        let _ = std::fs::remove_dir_all(root);
    }
}
