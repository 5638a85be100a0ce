use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wxwake::bot::Bot;
use wxwake::channels::{BridgeClient, TranscriptSource};
use wxwake::config::Config;
use wxwake::providers::CozeReplyGenerator;

#[derive(Parser, Debug)]
#[command(name = "wxwake", version, about = "Wake-word WeChat group bot")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Prompt for configuration interactively instead of reading a file.
    #[arg(long)]
    setup: bool,

    /// Base URL of the local desktop-automation bridge.
    #[arg(long, default_value = "http://127.0.0.1:39001")]
    bridge: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = if cli.setup {
        Config::from_prompts()?
    } else if let Some(path) = cli.config.as_deref() {
        Config::load(path)?
    } else {
        anyhow::bail!("pass --config <path> or --setup");
    };

    tracing::info!(
        "configured: {} conversation(s), {} wake word(s), idle timeout {}s, sweep every {}s, poll every {}s",
        config.allowed_conversations.len(),
        config.wake_words.len(),
        config.idle_timeout_secs,
        config.sweep_interval_secs,
        config.poll_interval_secs,
    );
    if config.allowed_conversations.is_empty() {
        tracing::warn!("allow-list is empty: no conversation will be auto-tracked");
    }

    let bridge = Arc::new(BridgeClient::connect(&cli.bridge).await?);
    tracing::info!("connected to bridge as '{}'", bridge.display_name());

    let generator = Arc::new(CozeReplyGenerator::new(
        config.api_token.clone(),
        config.bot_id.clone(),
    )?);

    let mut bot = Bot::new(&config, bridge.clone(), generator, bridge);
    bot.run().await
}
