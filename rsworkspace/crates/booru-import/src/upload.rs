//! Metadata-driven upload of a single downloaded file.

use std::path::Path;

use szuru_client::{ImageBoard, Post, Safety};
use tracing::{debug, info};

use crate::error::ImportError;
use crate::gallery::DownloadedItem;
use crate::metadata::{self, Metadata};
use crate::tags::TagResolver;

/// Where a post's single source URL comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceRule {
    /// The normalized URL the item was downloaded from.
    #[default]
    OriginUrl,
    /// `https://twitter.com/i/web/status/<tweet_id>` from the sidecar.
    /// Used for feeds (bookmarks) whose own URL is not a useful source.
    TweetStatus,
}

impl SourceRule {
    fn source_for(
        &self,
        item: &DownloadedItem,
        metadata: &Metadata,
        sidecar: &Path,
    ) -> Result<String, ImportError> {
        match self {
            Self::OriginUrl => Ok(item.origin_url.clone()),
            Self::TweetStatus => metadata
                .tweet_id()
                .map(|id| format!("https://twitter.com/i/web/status/{id}"))
                .ok_or_else(|| ImportError::MetadataField {
                    path: sidecar.to_path_buf(),
                    field: "tweet_id",
                }),
        }
    }
}

/// Uploads files one at a time against one board, sharing a per-batch
/// [`TagResolver`].
pub struct Uploader<'a, B> {
    board: &'a B,
    safety: Safety,
    source_rule: SourceRule,
    tags: TagResolver<'a, B>,
}

impl<'a, B: ImageBoard> Uploader<'a, B> {
    pub fn new(board: &'a B, safety: Safety, source_rule: SourceRule) -> Self {
        Self {
            board,
            safety,
            source_rule,
            tags: TagResolver::new(board),
        }
    }

    /// Upload `item` and commit a tagged post for it.
    ///
    /// The sidecar is read and validated before any remote call, so an item
    /// without usable metadata never leaves an untagged post behind.
    pub async fn upload(&mut self, item: &DownloadedItem) -> Result<Post, ImportError> {
        let (sidecar, metadata) = metadata::load(&item.path).await?;
        let tag_names = metadata.tag_names(&sidecar)?;
        let source = self.source_rule.source_for(item, &metadata, &sidecar)?;

        debug!(path = %item.path.display(), "Uploading");
        let token = self.board.upload_file(&item.path).await?;

        let mut post = self
            .board
            .create_post(&token, self.safety)
            .await
            .map_err(ImportError::Service)?;

        let tags = self.tags.resolve_all(&tag_names).await?;
        post.set_tags(&tags);
        post.set_sources([source.as_str()]);

        let post = self.board.push_post(&post).await?;
        info!(
            post_id = post.id,
            path = %item.path.display(),
            tags = ?tag_names,
            source = %source,
            "Post committed"
        );
        Ok(post)
    }

    pub fn cached_tags(&self) -> usize {
        self.tags.cached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::FixtureFile;
    use szuru_client::MemoryBoard;

    fn item(dir: &Path, fixture: FixtureFile, origin: &str) -> DownloadedItem {
        DownloadedItem {
            path: fixture.write_into(dir),
            origin_url: origin.to_string(),
        }
    }

    #[tokio::test]
    async fn uploads_tags_and_sources_a_post() {
        let dir = tempfile::tempdir().unwrap();
        let board = MemoryBoard::new("https://b").with_next_post_id(10);
        let it = item(
            dir.path(),
            FixtureFile::new("a.jpg", r#"{"author":{"name":"alice"},"hashtags":["x","y"]}"#),
            "https://example.com/gallery",
        );

        let post = Uploader::new(&board, Safety::Safe, SourceRule::OriginUrl)
            .upload(&it)
            .await
            .unwrap();

        assert_eq!(post.id, 10);
        assert_eq!(post.safety, Safety::Safe);
        assert_eq!(post.tag_names(), vec!["x", "y", "alice"]);
        assert_eq!(post.sources(), vec!["https://example.com/gallery"]);
        assert_eq!(board.uploaded_files(), vec!["a.jpg"]);
        assert_eq!(board.pushes(), vec![10]);
    }

    #[tokio::test]
    async fn missing_author_fails_before_any_remote_call() {
        let dir = tempfile::tempdir().unwrap();
        let board = MemoryBoard::new("https://b");
        let it = item(dir.path(), FixtureFile::new("a.jpg", r#"{"hashtags":["x"]}"#), "https://e/g");

        let err = Uploader::new(&board, Safety::Safe, SourceRule::OriginUrl)
            .upload(&it)
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::MetadataField { field: "author.name", .. }));
        assert!(board.lookups().is_empty());
        assert!(board.uploaded_files().is_empty());
        assert_eq!(board.post_count(), 0);
    }

    #[tokio::test]
    async fn missing_sidecar_is_metadata_missing() {
        let dir = tempfile::tempdir().unwrap();
        let board = MemoryBoard::new("https://b");
        let it = item(dir.path(), FixtureFile::without_sidecar("a.jpg"), "https://e/g");

        let err = Uploader::new(&board, Safety::Safe, SourceRule::OriginUrl)
            .upload(&it)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::MetadataMissing { .. }));
        assert!(board.uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn post_creation_failure_is_wrapped_service_error() {
        let dir = tempfile::tempdir().unwrap();
        let board = MemoryBoard::new("https://b");
        board.fail_post_creation();
        let it = item(dir.path(), FixtureFile::tagged("a.jpg", "alice", &[]), "https://e/g");

        let err = Uploader::new(&board, Safety::Safe, SourceRule::OriginUrl)
            .upload(&it)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Service(_)));
        assert!(err.to_string().starts_with("Szurubooru API error: ``"));
        assert!(board.lookups().is_empty());
    }

    #[tokio::test]
    async fn tweet_status_rule_builds_source_from_tweet_id() {
        let dir = tempfile::tempdir().unwrap();
        let board = MemoryBoard::new("https://b");
        let it = item(
            dir.path(),
            FixtureFile::new("t.jpg", r#"{"author":{"name":"alice"},"tweet_id":123}"#),
            "https://twitter.com/i/bookmarks",
        );

        let post = Uploader::new(&board, Safety::Safe, SourceRule::TweetStatus)
            .upload(&it)
            .await
            .unwrap();
        assert_eq!(post.sources(), vec!["https://twitter.com/i/web/status/123"]);
    }

    #[tokio::test]
    async fn tweet_status_rule_requires_tweet_id() {
        let dir = tempfile::tempdir().unwrap();
        let board = MemoryBoard::new("https://b");
        let it = item(dir.path(), FixtureFile::tagged("t.jpg", "alice", &[]), "https://twitter.com/i/bookmarks");

        let err = Uploader::new(&board, Safety::Safe, SourceRule::TweetStatus)
            .upload(&it)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::MetadataField { field: "tweet_id", .. }));
    }

    #[tokio::test]
    async fn shared_tags_are_resolved_once_per_uploader() {
        let dir = tempfile::tempdir().unwrap();
        let board = MemoryBoard::new("https://b");
        let mut uploader = Uploader::new(&board, Safety::Safe, SourceRule::OriginUrl);
        for name in ["a.jpg", "b.jpg"] {
            let it = item(dir.path(), FixtureFile::tagged(name, "alice", &["cat"]), "https://e/g");
            uploader.upload(&it).await.unwrap();
        }
        assert_eq!(board.lookups(), vec!["cat", "alice"]);
        assert_eq!(uploader.cached_tags(), 2);
    }
}
