//! One import batch, end to end.
//!
//! ```text
//! urls ─▶ scratch dir ─▶ fetch (per URL, abort on failure)
//!      ─▶ upload (per file, sequential) ─▶ release scratch ─▶ outcome
//! ```
//!
//! Uploads run strictly one at a time in download order. The board makes no
//! promise about concurrent post creation, and a single [`Uploader`] keeps
//! the batch's tag memo consistent.

use std::path::PathBuf;

use szuru_client::{ImageBoard, Post, Safety};
use tracing::{info, warn};

use crate::error::{ImportError, SkipReason};
use crate::gallery::{DownloadedItem, Downloader, fetch_gallery};
use crate::scratch::ScratchDir;
pub use crate::upload::SourceRule;
use crate::upload::Uploader;

/// Static settings shared by every batch.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Parent of the per-batch scratch directories.
    pub scratch_root: PathBuf,
    pub safety: Safety,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            scratch_root: PathBuf::from("./tmp"),
            safety: Safety::Safe,
        }
    }
}

/// What a failed item does to the rest of the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// First failure ends the batch with that error.
    #[default]
    AbortBatch,
    /// Record the item as skipped and continue.
    SkipItem,
}

#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    /// Already normalized URLs.
    pub urls: Vec<String>,
    /// Appended to every downloader invocation.
    pub extra_args: Vec<String>,
    pub failure_policy: FailurePolicy,
    pub source_rule: SourceRule,
}

impl BatchRequest {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            ..Self::default()
        }
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_source_rule(mut self, rule: SourceRule) -> Self {
        self.source_rule = rule;
        self
    }
}

/// An item left out of a [`FailurePolicy::SkipItem`] batch.
#[derive(Debug, Clone)]
pub struct SkippedItem {
    pub path: PathBuf,
    pub reason: SkipReason,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Committed posts, in upload order.
    pub posts: Vec<Post>,
    pub skipped: Vec<SkippedItem>,
}

#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// The request carried no URLs; nothing was spawned.
    NoUrls,
    /// Every downloader run succeeded but reported no files.
    NothingDownloaded,
    Completed(BatchReport),
}

/// Runs batches against one board and one downloader.
pub struct Importer<B, D> {
    board: B,
    downloader: D,
    settings: ImportSettings,
}

impl<B: ImageBoard, D: Downloader> Importer<B, D> {
    pub fn new(board: B, downloader: D, settings: ImportSettings) -> Self {
        Self {
            board,
            downloader,
            settings,
        }
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    /// Run one batch. The scratch directory is removed however this returns.
    pub async fn run(&self, request: BatchRequest) -> Result<BatchOutcome, ImportError> {
        if request.urls.is_empty() {
            return Ok(BatchOutcome::NoUrls);
        }

        let scratch = ScratchDir::create(&self.settings.scratch_root).await?;
        info!(
            urls = request.urls.len(),
            scratch = %scratch.path().display(),
            policy = ?request.failure_policy,
            "Batch started"
        );

        let mut items: Vec<DownloadedItem> = Vec::new();
        for url in &request.urls {
            let fetched =
                fetch_gallery(&self.downloader, url, scratch.path(), &request.extra_args).await?;
            items.extend(fetched);
        }

        let outcome = if items.is_empty() {
            BatchOutcome::NothingDownloaded
        } else {
            BatchOutcome::Completed(self.upload_all(&items, &request).await?)
        };

        if let Err(e) = scratch.release().await {
            warn!(error = %e, "Scratch cleanup failed");
        }

        if let BatchOutcome::Completed(report) = &outcome {
            info!(
                posts = report.posts.len(),
                skipped = report.skipped.len(),
                "Batch finished"
            );
        }
        Ok(outcome)
    }

    async fn upload_all(
        &self,
        items: &[DownloadedItem],
        request: &BatchRequest,
    ) -> Result<BatchReport, ImportError> {
        let mut uploader = Uploader::new(&self.board, self.settings.safety, request.source_rule);
        let mut report = BatchReport::default();

        for item in items {
            match uploader.upload(item).await {
                Ok(post) => report.posts.push(post),
                Err(e) if request.failure_policy == FailurePolicy::SkipItem => {
                    let reason = e.skip_reason();
                    warn!(path = %item.path.display(), %reason, error = %e, "Skipping item");
                    report.skipped.push(SkippedItem {
                        path: item.path.clone(),
                        reason,
                        detail: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}
