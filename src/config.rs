//! Startup configuration.
//!
//! Two sources: a TOML file, or interactive setup prompts mirroring the
//! fields (conversations and wake words entered as `-`-separated lists).
//! Everything is read-only once the loop starts.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 180;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Coze API token (pat_xxx).
    pub api_token: String,
    /// Coze bot id used for reply generation.
    pub bot_id: String,
    /// Conversations that may be auto-tracked. Empty means none.
    #[serde(default)]
    pub allowed_conversations: Vec<String>,
    /// Wake words that trigger a reply without an @-mention.
    #[serde(default)]
    pub wake_words: Vec<String>,
    /// Seconds of inactivity before a tracked conversation is evicted.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Seconds between idle-sweep passes.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Seconds the loop sleeps between iterations.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Interactive setup, mirroring the config fields one prompt at a
    /// time. Lists are entered `-`-separated; wake words may be left
    /// empty to respond to @-mentions only.
    pub fn from_prompts() -> Result<Self> {
        let api_token: String = dialoguer::Input::new()
            .with_prompt("Coze API token (pat_xxx)")
            .interact_text()
            .context("failed to read API token")?;
        let bot_id: String = dialoguer::Input::new()
            .with_prompt("Coze bot id")
            .interact_text()
            .context("failed to read bot id")?;
        let conversations: String = dialoguer::Input::new()
            .with_prompt("Conversations to listen to (separate with -)")
            .allow_empty(true)
            .interact_text()
            .context("failed to read conversation list")?;
        let wake_words: String = dialoguer::Input::new()
            .with_prompt("Wake words (separate with -, empty for @-mentions only)")
            .allow_empty(true)
            .interact_text()
            .context("failed to read wake words")?;

        let config = Self {
            api_token: api_token.trim().to_string(),
            bot_id: bot_id.trim().to_string(),
            allowed_conversations: split_dash_list(&conversations),
            wake_words: split_dash_list(&wake_words),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            anyhow::bail!("api_token must not be empty");
        }
        if self.bot_id.trim().is_empty() {
            anyhow::bail!("bot_id must not be empty");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Split a `-`-separated prompt answer into trimmed, non-empty items.
pub fn split_dash_list(input: &str) -> Vec<String> {
    input
        .split('-')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
