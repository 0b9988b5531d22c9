//! booru-bot
//!
//! Discord bot that imports gallery links into a szurubooru board: it runs
//! gallery-dl on the links, uploads every file it reports and tags the posts
//! from the downloaded metadata.

mod access;
mod commands;
mod config;
mod errors;
mod handlers;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use booru_import::{GalleryDl, ImportSettings, Importer};
use clap::Parser;
use serenity::model::gateway::GatewayIntents;
use serenity::prelude::*;
use szuru_client::{SzurubooruClient, SzurubooruConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::access::AccessPolicy;
use crate::commands::{BookmarksSettings, BotRunner, CommandRunner};
use crate::config::Config;
use crate::handlers::Handler;
use crate::health::AppState;

/// booru-bot CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/booru-bot.toml")]
    config: String,

    /// Discord bot token (overrides config file)
    #[arg(long, env = "DISCORD_BOT_TOKEN")]
    bot_token: Option<String>,

    /// szurubooru base URL (overrides config file)
    #[arg(long, env = "BOORU_URL")]
    booru_url: Option<String>,

    /// Health check server port
    #[arg(long, env = "HEALTH_CHECK_PORT", default_value = "3001")]
    health_port: u16,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(bot_token) = &self.bot_token {
            config.discord.bot_token = bot_token.clone();
        }
        if let Some(url) = &self.booru_url {
            config.booru.url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "booru_bot=debug,booru_import=debug,szuru_client=info,info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booru-bot");

    let args = Args::parse();

    let mut config = if std::path::Path::new(&args.config).exists() {
        info!("Loading config from file: {}", args.config);
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, loading from environment");
        Config::from_env()?
    };
    args.apply(&mut config);

    // Warn about suspicious access-control configuration
    for w in config.discord.access.warnings() {
        warn!("Access config: {}", w);
    }

    let board_config = SzurubooruConfig::new(
        config.booru.url.clone(),
        config.booru.username.clone(),
        config.booru.token.clone(),
    )
    .with_tag_category(config.booru.tag_category.clone());
    let board = SzurubooruClient::new(board_config).context("Failed to build szurubooru client")?;
    info!("Image board: {}", config.booru.url);

    let downloader = GalleryDl::new(&config.import.downloader)
        .context("import.downloader must name a program")?;
    info!("Downloader: {}", downloader.program());

    let importer = Importer::new(
        board,
        downloader,
        ImportSettings {
            scratch_root: config.import.scratch_root.clone(),
            safety: config.booru.safety,
        },
    );
    let runner: BotRunner = CommandRunner::new(
        importer,
        AccessPolicy::new(&config.discord.access),
        BookmarksSettings {
            url: config.import.bookmarks_url.clone(),
            cookie_file: config.import.cookie_file.clone(),
            default_limit: config.import.bookmarks_default_limit,
        },
    )
    .with_modal_timeout(Duration::from_secs(config.import.modal_timeout_secs));

    let health_state = AppState::new(runner.batch_counter());

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILDS;

    let handler = Handler {
        guild_ids: config.discord.guild_ids.clone(),
        command_prefix: config.discord.command_prefix.clone(),
    };

    let mut client = Client::builder(&config.discord.bot_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Discord client: {}", e))?;

    {
        let mut data = client.data.write().await;
        data.insert::<BotRunner>(Arc::new(runner));
        data.insert::<AppState>(health_state.clone());
    }

    // Start health check server
    let health_port = args.health_port;
    tokio::spawn(async move {
        if let Err(e) = health::start_health_server(health_state, health_port).await {
            error!("Health server error: {}", e);
        }
    });

    // Graceful shutdown: close all shards on SIGTERM or Ctrl+C.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("Shutdown signal received, stopping Discord client...");
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord gateway connection...");

    // Blocks until all shards are stopped
    client
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Discord client error: {}", e))?;

    info!("booru-bot stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
