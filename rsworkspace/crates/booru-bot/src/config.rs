//! Configuration management for booru-bot

#[path = "config_tests.rs"]
mod config_tests;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use szuru_client::{DEFAULT_TAG_CATEGORY, Safety};

use crate::access::AccessConfig;

/// Source of environment variables, swappable in tests.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordBotConfig,
    pub booru: BooruConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

/// Discord bot specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordBotConfig {
    /// Bot token from the Discord developer portal
    #[serde(default = "default_bot_token")]
    pub bot_token: String,
    /// Guilds to register application commands in; empty means global
    #[serde(default)]
    pub guild_ids: Vec<u64>,
    /// Prefix for text commands
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Access control configuration
    #[serde(default)]
    pub access: AccessConfig,
}

/// szurubooru connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BooruConfig {
    pub url: String,
    pub username: String,
    pub token: String,
    /// Category given to tags the bot creates
    #[serde(default = "default_tag_category")]
    pub tag_category: String,
    #[serde(default)]
    pub safety: Safety,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Downloader argv prefix; the URL and output flags are appended
    #[serde(default = "default_downloader")]
    pub downloader: Vec<String>,
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,
    #[serde(default = "default_cookie_file")]
    pub cookie_file: PathBuf,
    #[serde(default = "default_bookmarks_url")]
    pub bookmarks_url: String,
    #[serde(default = "default_bookmarks_limit")]
    pub bookmarks_default_limit: u32,
    #[serde(default = "default_modal_timeout_secs")]
    pub modal_timeout_secs: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            downloader: default_downloader(),
            scratch_root: default_scratch_root(),
            cookie_file: default_cookie_file(),
            bookmarks_url: default_bookmarks_url(),
            bookmarks_default_limit: default_bookmarks_limit(),
            modal_timeout_secs: default_modal_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(&SystemEnv)
    }

    pub fn from_env_with(env: &impl ReadEnv) -> Result<Self> {
        let required = |key: &str| env.var(key).with_context(|| format!("{key} not set"));

        let bot_token = required("DISCORD_BOT_TOKEN")?;
        let url = required("BOORU_URL")?;
        let username = required("BOORU_USERNAME")?;
        let token = required("BOORU_TOKEN")?;

        let guild_ids = parse_id_list(&env.var("DISCORD_GUILD_IDS").unwrap_or_default());
        let owner_users = parse_id_list(&env.var("DISCORD_OWNER_USERS").unwrap_or_default());
        let command_prefix = env
            .var("DISCORD_COMMAND_PREFIX")
            .filter(|p| !p.is_empty())
            .unwrap_or_else(default_command_prefix);

        let tag_category = env
            .var("BOORU_TAG_CATEGORY")
            .filter(|c| !c.is_empty())
            .unwrap_or_else(default_tag_category);

        let mut import = ImportConfig::default();
        if let Some(downloader) = env.var("BOORU_DOWNLOADER") {
            let argv: Vec<String> = downloader.split_whitespace().map(str::to_string).collect();
            if !argv.is_empty() {
                import.downloader = argv;
            }
        }
        if let Some(root) = env.var("BOORU_SCRATCH_ROOT") {
            import.scratch_root = PathBuf::from(root);
        }
        if let Some(cookies) = env.var("BOORU_COOKIE_FILE") {
            import.cookie_file = PathBuf::from(cookies);
        }

        Ok(Config {
            discord: DiscordBotConfig {
                bot_token,
                guild_ids,
                command_prefix,
                access: AccessConfig {
                    owner_users,
                    ..AccessConfig::default()
                },
            },
            booru: BooruConfig {
                url,
                username,
                token,
                tag_category,
                safety: Safety::Safe,
            },
            import,
        })
    }
}

fn default_bot_token() -> String {
    std::env::var("DISCORD_BOT_TOKEN").unwrap_or_default()
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_tag_category() -> String {
    DEFAULT_TAG_CATEGORY.to_string()
}

fn default_downloader() -> Vec<String> {
    vec!["gallery-dl".to_string()]
}

fn default_scratch_root() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_cookie_file() -> PathBuf {
    PathBuf::from("cookies.txt")
}

fn default_bookmarks_url() -> String {
    "https://twitter.com/i/bookmarks".to_string()
}

fn default_bookmarks_limit() -> u32 {
    10
}

fn default_modal_timeout_secs() -> u64 {
    300
}

fn parse_id_list(s: &str) -> Vec<u64> {
    s.split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .filter_map(|x| x.parse::<u64>().ok())
        .collect()
}
