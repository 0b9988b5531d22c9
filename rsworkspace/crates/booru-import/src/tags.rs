//! Tag resolution: look a tag up, create it when the board reports it missing.

use std::collections::HashMap;

use szuru_client::{BoardError, ImageBoard, Tag};
use tracing::{debug, info};

/// One lookup, plus one create when the lookup is "not found". Any other
/// lookup failure propagates untouched.
pub async fn get_or_create_tag<B: ImageBoard>(board: &B, name: &str) -> Result<Tag, BoardError> {
    match board.get_tag(name).await {
        Ok(tag) => Ok(tag),
        Err(e) if e.is_not_found() => {
            info!(tag = %name, "Tag not found, creating");
            board.create_tag(name).await
        }
        Err(e) => Err(e),
    }
}

/// Per-batch memo over [`get_or_create_tag`].
///
/// Keys are lowercased since the board matches tag names case-insensitively.
/// Dropped at the end of the batch; nothing is cached across batches.
pub struct TagResolver<'a, B> {
    board: &'a B,
    cache: HashMap<String, Tag>,
}

impl<'a, B: ImageBoard> TagResolver<'a, B> {
    pub fn new(board: &'a B) -> Self {
        Self {
            board,
            cache: HashMap::new(),
        }
    }

    pub async fn resolve(&mut self, name: &str) -> Result<Tag, BoardError> {
        let key = name.to_lowercase();
        if let Some(tag) = self.cache.get(&key) {
            debug!(tag = %name, "Tag cache hit");
            return Ok(tag.clone());
        }
        let tag = get_or_create_tag(self.board, name).await?;
        self.cache.insert(key, tag.clone());
        Ok(tag)
    }

    /// Resolve `names` in order.
    pub async fn resolve_all(&mut self, names: &[String]) -> Result<Vec<Tag>, BoardError> {
        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            tags.push(self.resolve(name).await?);
        }
        Ok(tags)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use szuru_client::{MemoryBoard, Post, Safety, UploadToken};

    #[tokio::test]
    async fn missing_tag_is_looked_up_once_then_created_once() {
        let board = MemoryBoard::new("https://b");
        let tag = get_or_create_tag(&board, "cat").await.unwrap();
        assert_eq!(tag.name(), "cat");
        assert_eq!(board.lookups(), vec!["cat"]);
        assert_eq!(board.creates(), vec!["cat"]);
    }

    #[tokio::test]
    async fn existing_tag_is_never_created() {
        let board = MemoryBoard::new("https://b").with_tags(["cat"]);
        get_or_create_tag(&board, "cat").await.unwrap();
        assert_eq!(board.lookups(), vec!["cat"]);
        assert!(board.creates().is_empty());
    }

    #[tokio::test]
    async fn resolver_memoizes_within_a_batch() {
        let board = MemoryBoard::new("https://b").with_tags(["x"]);
        let mut resolver = TagResolver::new(&board);
        resolver
            .resolve_all(&["x".into(), "alice".into(), "X".into(), "alice".into()])
            .await
            .unwrap();
        assert_eq!(board.lookups(), vec!["x", "alice"]);
        assert_eq!(board.creates(), vec!["alice"]);
        assert_eq!(resolver.cached(), 2);
    }

    #[tokio::test]
    async fn fresh_resolver_does_not_share_cache() {
        let board = MemoryBoard::new("https://b");
        TagResolver::new(&board).resolve("cat").await.unwrap();
        TagResolver::new(&board).resolve("cat").await.unwrap();
        assert_eq!(board.lookups(), vec!["cat", "cat"]);
        assert_eq!(board.creates(), vec!["cat"]);
    }

    struct UnavailableBoard;

    impl ImageBoard for UnavailableBoard {
        fn base_url(&self) -> &str {
            "https://down"
        }
        async fn get_tag(&self, _name: &str) -> Result<Tag, BoardError> {
            Err(BoardError::Api {
                status: 503,
                name: "ServiceUnavailable".into(),
                description: String::new(),
            })
        }
        async fn create_tag(&self, _name: &str) -> Result<Tag, BoardError> {
            panic!("create must not follow a non-not-found lookup failure")
        }
        async fn upload_file(&self, _p: &std::path::Path) -> Result<UploadToken, BoardError> {
            unreachable!()
        }
        async fn create_post(&self, _t: &UploadToken, _s: Safety) -> Result<Post, BoardError> {
            unreachable!()
        }
        async fn push_post(&self, _p: &Post) -> Result<Post, BoardError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn other_lookup_errors_propagate() {
        let err = get_or_create_tag(&UnavailableBoard, "cat").await.unwrap_err();
        assert!(matches!(err, BoardError::Api { status: 503, .. }));
    }
}
