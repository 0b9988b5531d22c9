//! Command failures and the error reporter.
//!
//! Every entry point returns `Result<_, CommandError>`. [`report`] turns a
//! failure into the text sent back to the user, or `None` when nothing
//! should be sent. [`log_discord_error`] logs failures of the Discord API
//! itself at a level matching their kind.

use booru_import::ImportError;
use serenity::http::HttpError;
use tracing::{error, warn};

/// Maximum characters of error trace included in a reply.
pub const TRACE_BUDGET: usize = 1700;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Command \"{0}\" is not found")]
    NotFound(String),

    /// The user has already been told; nothing more to send.
    #[error("already handled")]
    Handled,

    #[error("You do not own this bot.")]
    NotOwner,

    #[error("{0} is a required argument that is missing.")]
    MissingArgument(&'static str),

    #[error("{0}")]
    BadArgument(String),

    /// A local file the command needs is absent.
    #[error("{0}")]
    Prerequisite(#[source] ImportError),

    #[error("Command raised an exception: {source}")]
    Invoke {
        command: &'static str,
        source: anyhow::Error,
    },
}

impl CommandError {
    pub fn invoke(command: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Invoke {
            command,
            source: source.into(),
        }
    }
}

/// Text to send for `err`, if any.
pub fn report(err: &CommandError) -> Option<String> {
    match err {
        CommandError::Handled | CommandError::NotFound(_) => None,
        CommandError::Invoke { command, source } => {
            let trace = truncate_trace(&format!("{source:?}"));
            Some(format!("An error occurred in ``{command}``: {trace}"))
        }
        other => Some(other.to_string()),
    }
}

/// Fence `trace`, cutting it to [`TRACE_BUDGET`] characters.
pub fn truncate_trace(trace: &str) -> String {
    let total = trace.chars().count();
    if total <= TRACE_BUDGET {
        return format!("```\n{trace}```");
    }
    let head: String = trace.chars().take(TRACE_BUDGET).collect();
    format!(
        "```\n{head}```\n{} characters omitted...",
        total - TRACE_BUDGET
    )
}

/// Log a serenity error at a level matching its cause.
///
/// - Rate limits and other 4xx responses → `warn!`
/// - Everything else → `error!`
pub fn log_discord_error(context: &str, err: &serenity::Error) {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => {
            let status = resp.status_code.as_u16();
            if status == 429 {
                warn!("{}: rate limited", context);
            } else if (400..500).contains(&status) {
                warn!(
                    "{} (HTTP {} / code {}): {}",
                    context, status, resp.error.code, resp.error.message
                );
            } else {
                error!("{} (HTTP {}): {}", context, status, resp.error.message);
            }
        }
        _ => error!("{}: {}", context, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn handled_and_unknown_commands_are_silent() {
        assert_eq!(report(&CommandError::Handled), None);
        assert_eq!(report(&CommandError::NotFound("frobnicate".into())), None);
    }

    #[test]
    fn plain_errors_are_sent_as_is() {
        assert_eq!(
            report(&CommandError::NotOwner).as_deref(),
            Some("You do not own this bot.")
        );
        assert_eq!(
            report(&CommandError::MissingArgument("url")).as_deref(),
            Some("url is a required argument that is missing.")
        );
    }

    #[test]
    fn prerequisite_shows_hint_only() {
        let err = CommandError::Prerequisite(ImportError::PrerequisiteMissing {
            path: PathBuf::from("cookies.txt"),
            hint: "Put cookies.txt next to the bot.".into(),
        });
        assert_eq!(report(&err).as_deref(), Some("Put cookies.txt next to the bot."));
    }

    #[test]
    fn invoke_errors_name_the_command_and_fence_the_trace() {
        let err = CommandError::invoke(
            "add",
            ImportError::Downloader {
                status: Some(1),
                output: "[error] Unsupported URL".into(),
            },
        );
        let text = report(&err).unwrap();
        assert!(text.starts_with("An error occurred in ``add``: ```\n"), "{text}");
        assert!(text.contains("There was an error when communicating with gallery-dl: [error] Unsupported URL"));
        assert!(text.ends_with("```"));
    }

    #[test]
    fn invoke_trace_includes_cause_chain() {
        let source = anyhow::anyhow!("connection reset").context("uploading a.jpg");
        let text = report(&CommandError::invoke("bookmarks", source)).unwrap();
        assert!(text.contains("uploading a.jpg"));
        assert!(text.contains("connection reset"));
    }

    #[test]
    fn short_trace_is_not_truncated() {
        let trace = "x".repeat(TRACE_BUDGET);
        assert_eq!(truncate_trace(&trace), format!("```\n{trace}```"));
    }

    #[test]
    fn long_trace_reports_omitted_characters() {
        let trace = "y".repeat(TRACE_BUDGET + 42);
        let out = truncate_trace(&trace);
        assert!(out.starts_with("```\n"));
        assert!(out.ends_with("```\n42 characters omitted..."));
        assert_eq!(out.matches('y').count(), TRACE_BUDGET);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let trace = "é".repeat(TRACE_BUDGET + 1);
        let out = truncate_trace(&trace);
        assert!(out.ends_with("\n1 characters omitted..."));
    }

    #[test]
    fn reported_invoke_fits_in_one_message() {
        let err = CommandError::invoke("Upload to booru", anyhow::anyhow!("z".repeat(10_000)));
        assert!(report(&err).unwrap().chars().count() < 2000);
    }
}
