//! The bot's commands, independent of the Discord transport.
//!
//! [`CommandRunner`] executes the three entry points and returns the
//! [`Reply`] to send. `handlers` owns everything Discord-specific:
//! deferring, modals and message delivery.

#[path = "commands_tests.rs"]
mod commands_tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use booru_import::urls::{extract_urls, normalize_url, split_links};
use booru_import::{
    BatchOutcome, BatchReport, BatchRequest, Downloader, FailurePolicy, GalleryDl, ImportError,
    Importer, SourceRule,
};
use serenity::all::{CommandOptionType, CommandType, CreateCommand, CreateCommandOption};
use serenity::prelude::TypeMapKey;
use szuru_client::{ImageBoard, SzurubooruClient};
use tracing::info;

use crate::access::{AccessPolicy, CommandKind};
use crate::errors::CommandError;

pub const CONTEXT_MENU_NAME: &str = "Upload to booru";
pub const NO_URLS: &str = "No urls detected in this message.";
pub const NO_PATHS: &str = "No paths given by gallery-dl?";
pub const MODAL_CANCELLED: &str = "Submit modal cancelled";
pub const BOORU_HELP: &str = "```\nbooru add [strip_query] <links>\n    Upload comma-separated gallery links to the booru.\n```";

/// Discord's per-message character limit.
const MESSAGE_LIMIT: usize = 2000;

/// Text to send back, and whether only the invoker should see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub ephemeral: bool,
}

impl Reply {
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn private(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }

    /// Split on line boundaries into messages Discord accepts.
    pub fn chunks(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = String::new();
        for line in self.content.split('\n') {
            let line_len = line.chars().count();
            let current_len = current.chars().count();
            if !current.is_empty() && current_len + 1 + line_len > MESSAGE_LIMIT {
                out.push(std::mem::take(&mut current));
            }
            if line_len > MESSAGE_LIMIT {
                let chars: Vec<char> = line.chars().collect();
                for piece in chars.chunks(MESSAGE_LIMIT) {
                    out.push(piece.iter().collect());
                }
                continue;
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
        if !current.is_empty() || out.is_empty() {
            out.push(current);
        }
        out
    }
}

/// A parsed command, from either a slash interaction or a text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// `booru` without a usable subcommand.
    Help,
    Add {
        strip_query: bool,
        links: Option<String>,
    },
    Bookmarks {
        limit: Option<i64>,
    },
}

/// Fixed inputs of the bookmarks import.
#[derive(Debug, Clone)]
pub struct BookmarksSettings {
    pub url: String,
    pub cookie_file: PathBuf,
    pub default_limit: u32,
}

pub struct CommandRunner<B, D> {
    importer: Importer<B, D>,
    access: AccessPolicy,
    bookmarks: BookmarksSettings,
    modal_timeout: Duration,
    batches_completed: Arc<AtomicU64>,
}

/// The runner the bot process uses.
pub type BotRunner = CommandRunner<SzurubooruClient, GalleryDl>;

impl TypeMapKey for BotRunner {
    type Value = Arc<BotRunner>;
}

impl<B: ImageBoard, D: Downloader> CommandRunner<B, D> {
    pub fn new(importer: Importer<B, D>, access: AccessPolicy, bookmarks: BookmarksSettings) -> Self {
        Self {
            importer,
            access,
            bookmarks,
            modal_timeout: Duration::from_secs(300),
            batches_completed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_modal_timeout(mut self, timeout: Duration) -> Self {
        self.modal_timeout = timeout;
        self
    }

    pub fn access(&self) -> &AccessPolicy {
        &self.access
    }

    pub fn modal_timeout(&self) -> Duration {
        self.modal_timeout
    }

    /// Shared counter of batches that reached the upload stage.
    pub fn batch_counter(&self) -> Arc<AtomicU64> {
        self.batches_completed.clone()
    }

    pub fn authorize(&self, user_id: u64, kind: CommandKind) -> Result<(), CommandError> {
        self.access.authorize(user_id, kind)
    }

    /// "Upload to booru" on a message: import every URL in its text.
    pub async fn context_import(&self, user_id: u64, text: &str) -> Result<Reply, CommandError> {
        let kind = CommandKind::ContextImport;
        self.authorize(user_id, kind)?;

        let urls = extract_urls(text, true);
        if urls.is_empty() {
            return Ok(Reply::private(NO_URLS));
        }

        let report = match self.run_batch(kind, BatchRequest::new(urls)).await? {
            Some(report) => report,
            None => return Ok(Reply::private(NO_PATHS)),
        };
        Ok(Reply::private(self.posts_text(&report)))
    }

    /// `booru add`: import a comma-separated list of links.
    pub async fn add(
        &self,
        user_id: u64,
        strip_query: bool,
        links: &str,
    ) -> Result<Reply, CommandError> {
        let kind = CommandKind::Add;
        self.authorize(user_id, kind)?;

        let urls: Vec<String> = split_links(links)
            .into_iter()
            .map(|link| normalize_url(link, strip_query))
            .filter(|url| !url.is_empty())
            .collect();
        if urls.is_empty() {
            return Ok(Reply::public(NO_URLS));
        }

        let report = match self.run_batch(kind, BatchRequest::new(urls)).await? {
            Some(report) => report,
            None => return Ok(Reply::public(NO_PATHS)),
        };
        Ok(Reply::public(self.posts_text(&report)))
    }

    /// `bookmarks`: import the newest `limit` bookmarked items, skipping
    /// items that fail.
    pub async fn bookmarks(&self, user_id: u64, limit: Option<i64>) -> Result<Reply, CommandError> {
        let kind = CommandKind::Bookmarks;
        self.authorize(user_id, kind)?;

        let limit = limit.unwrap_or(i64::from(self.bookmarks.default_limit));
        if limit < 1 {
            return Err(CommandError::BadArgument(
                "limit must be at least 1.".to_string(),
            ));
        }

        let cookie_file = &self.bookmarks.cookie_file;
        ensure_cookie_file(cookie_file).await?;

        let request = BatchRequest::new(vec![self.bookmarks.url.clone()])
            .with_extra_args(vec![
                "--cookies".to_string(),
                cookie_file.display().to_string(),
                "--range".to_string(),
                format!("1-{limit}"),
            ])
            .with_failure_policy(FailurePolicy::SkipItem)
            .with_source_rule(SourceRule::TweetStatus);

        let report = match self.run_batch(kind, request).await? {
            Some(report) => report,
            None => return Ok(Reply::public(NO_PATHS)),
        };

        let mut text = self.posts_text(&report);
        if !report.skipped.is_empty() {
            text.push_str(&format!("\nSkipped {} item(s):", report.skipped.len()));
            for item in &report.skipped {
                let name = item
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| item.path.display().to_string());
                text.push_str(&format!("\n- {name}: {}", item.reason));
            }
        }
        Ok(Reply::public(text))
    }

    /// `None` when the downloader reported no files.
    async fn run_batch(
        &self,
        kind: CommandKind,
        request: BatchRequest,
    ) -> Result<Option<BatchReport>, CommandError> {
        let outcome = self
            .importer
            .run(request)
            .await
            .map_err(|e| CommandError::invoke(kind.name(), e))?;

        match outcome {
            BatchOutcome::NoUrls | BatchOutcome::NothingDownloaded => Ok(None),
            BatchOutcome::Completed(report) => {
                self.batches_completed.fetch_add(1, Ordering::Relaxed);
                info!(
                    command = kind.name(),
                    posts = report.posts.len(),
                    "Import finished"
                );
                Ok(Some(report))
            }
        }
    }

    fn posts_text(&self, report: &BatchReport) -> String {
        let base = self.importer.board().base_url();
        let joined = report
            .posts
            .iter()
            .map(|post| post.url(base))
            .collect::<Vec<_>>()
            .join("\n");
        if joined.is_empty() {
            "Returned posts: None".to_string()
        } else {
            format!("Returned posts: {joined}")
        }
    }
}

async fn ensure_cookie_file(path: &Path) -> Result<(), CommandError> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(());
    }
    Err(CommandError::Prerequisite(ImportError::PrerequisiteMissing {
        path: path.to_path_buf(),
        hint: format!(
            "No cookie file found at `{}`. Export your browser cookies for the bookmarks site \
             to that file and try again.",
            path.display()
        ),
    }))
}

/// Parse a text command. `None` when `content` does not start with `prefix`.
pub fn parse_prefix(content: &str, prefix: &str) -> Option<Result<Invocation, CommandError>> {
    let rest = content.strip_prefix(prefix)?;
    if prefix.is_empty() || rest.starts_with(char::is_whitespace) {
        return None;
    }

    let (name, args) = split_word(rest);
    let parsed = match name {
        "booru" => {
            let (sub, args) = split_word(args);
            match sub {
                "add" => parse_add_args(args),
                _ => Ok(Invocation::Help),
            }
        }
        "bookmarks" => parse_bookmarks_args(args),
        "" => return None,
        other => Err(CommandError::NotFound(other.to_string())),
    };
    Some(parsed)
}

fn parse_add_args(args: &str) -> Result<Invocation, CommandError> {
    let (first, rest) = split_word(args);
    let (strip_query, links) = match parse_bool(first) {
        Some(flag) => (flag, rest),
        None => (true, args),
    };
    if links.is_empty() {
        return Err(CommandError::MissingArgument("url"));
    }
    Ok(Invocation::Add {
        strip_query,
        links: Some(links.to_string()),
    })
}

fn parse_bookmarks_args(args: &str) -> Result<Invocation, CommandError> {
    let (first, _) = split_word(args);
    if first.is_empty() {
        return Ok(Invocation::Bookmarks { limit: None });
    }
    first
        .parse::<i64>()
        .map(|n| Invocation::Bookmarks { limit: Some(n) })
        .map_err(|_| {
            CommandError::BadArgument("Converting to \"int\" failed for parameter \"limit\".".to_string())
        })
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim()),
        None => (s, ""),
    }
}

/// Boolean spellings accepted for command arguments.
fn parse_bool(word: &str) -> Option<bool> {
    match word.to_lowercase().as_str() {
        "yes" | "y" | "true" | "t" | "1" | "enable" | "on" => Some(true),
        "no" | "n" | "false" | "f" | "0" | "disable" | "off" => Some(false),
        _ => None,
    }
}

/// Application commands to register.
pub fn definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new(CONTEXT_MENU_NAME).kind(CommandType::Message),
        CreateCommand::new("booru")
            .description("Image board commands")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::SubCommand,
                    "add",
                    "Upload gallery links to the booru",
                )
                .add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::Boolean,
                        "strip_query",
                        "Remove query strings from the links (default: true)",
                    )
                    .required(false),
                )
                .add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "links",
                        "Comma-separated links; leave empty to open a form",
                    )
                    .required(false),
                ),
            ),
        CreateCommand::new("bookmarks")
            .description("Import the newest bookmarked posts")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "limit",
                    "How many bookmarks to import",
                )
                .min_int_value(1)
                .required(false),
            ),
    ]
}
