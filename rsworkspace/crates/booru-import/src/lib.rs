//! # booru-import
//!
//! Pipeline that turns gallery URLs into tagged image-board posts.
//!
//! ```text
//! text ──urls──▶ normalized URLs ──gallery──▶ downloaded files + <file>.json
//!      ──upload (tags, metadata)──▶ committed posts ──▶ scratch dir removed
//! ```
//!
//! - [`urls`]: find URLs in free text, trim `<...>` and strip query strings.
//! - [`gallery`]: run `gallery-dl` into a scratch directory and collect the
//!   file paths it reports.
//! - [`metadata`]: read the JSON sidecar written next to each file.
//! - [`tags`]: look up or create tags, memoized per batch.
//! - [`upload`]: upload one file, create its post, tag it and push it.
//! - [`scratch`]: per-batch temporary directory, removed on every exit path.
//! - [`pipeline`]: one batch end to end, with abort or skip failure policy.
//!
//! The image board is reached through [`szuru_client::ImageBoard`] and the
//! downloader through [`gallery::Downloader`], so both can be replaced in
//! tests (see `mocks`, behind the `test-support` feature).

pub mod error;
pub mod gallery;
pub mod metadata;
pub mod pipeline;
pub mod scratch;
pub mod tags;
pub mod upload;
pub mod urls;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use error::{ImportError, SkipReason};
pub use gallery::{DownloadedItem, Downloader, GalleryDl};
pub use metadata::Metadata;
pub use pipeline::{
    BatchOutcome, BatchReport, BatchRequest, FailurePolicy, ImportSettings, Importer,
    SkippedItem, SourceRule,
};
pub use scratch::ScratchDir;
pub use tags::TagResolver;
pub use upload::Uploader;
