//! `shoal`: terminal chat frontend over the shoal relay.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use shoal_client::{
    AssetPrefetch, ClientConfig, EnvName, FileConfig, FixedName, IdentityResolver, Profile,
    RenderSink, ShoalClient,
};

#[derive(Parser)]
#[command(name = "shoal")]
#[command(about = "Terminal chat client for the shoal relay")]
struct Cli {
    /// Endpoint preset.
    #[arg(long, value_enum)]
    profile: Option<Profile>,

    /// Room to join.
    #[arg(long)]
    room: Option<String>,

    /// Display name. Falls back to $SHOAL_NAME, then a random guest name.
    #[arg(long)]
    name: Option<String>,

    /// Path to shoal.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Prints one line per message, `*` marking our own.
struct StdoutSink;

impl RenderSink for StdoutSink {
    fn append(&self, sender: &str, text: &str, is_self: bool) {
        let marker = if is_self { "*" } else { " " };
        println!("{marker}{sender}: {text}");
    }
}

/// The terminal frontend renders no avatars; prefetch just notes the
/// reference for debugging.
struct LogPrefetch;

impl AssetPrefetch for LogPrefetch {
    fn prefetch(&self, reference: &str) {
        debug!(%reference, "skin asset referenced");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let file = FileConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let config = ClientConfig::resolve(&file, cli.profile, cli.room)?;

    let resolver: Arc<dyn IdentityResolver> = match cli.name {
        Some(name) => Arc::new(FixedName::new(name)),
        None => Arc::new(EnvName),
    };

    let client = ShoalClient::connect(
        &config,
        resolver,
        Arc::new(StdoutSink),
        Arc::new(LogPrefetch),
    );
    println!(
        "joined room '{}' -- type to chat, Ctrl-D to quit",
        config.room()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        client.say(&line);
    }

    client.shutdown().await;
    Ok(())
}
