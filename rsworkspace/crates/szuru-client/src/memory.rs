//! In-memory [`ImageBoard`] backed by `Arc<Mutex<..>>`.
//!
//! Suitable for tests and dry runs. Records every remote call so callers
//! can assert on round trips (lookups, creates, uploads, pushes).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::board::{ImageBoard, upload_name};
use crate::error::BoardError;
use crate::types::{Post, Safety, Tag, UploadToken};

#[derive(Default)]
struct State {
    tags: HashMap<String, Tag>,
    uploads: HashMap<String, String>,
    posts: BTreeMap<u64, Post>,
    next_post_id: u64,
    next_upload: u64,
    lookups: Vec<String>,
    creates: Vec<String>,
    uploaded_files: Vec<String>,
    pushes: Vec<u64>,
    fail_post_creation: bool,
}

/// Thread-safe in-memory image board.
#[derive(Clone)]
pub struct MemoryBoard {
    base_url: String,
    inner: Arc<Mutex<State>>,
}

impl MemoryBoard {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            inner: Arc::new(Mutex::new(State {
                next_post_id: 1,
                ..State::default()
            })),
        }
    }

    /// Seed existing tags without counting them as creates.
    pub fn with_tags<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = self.inner.lock().unwrap();
            for name in names {
                let name = name.into();
                state.tags.insert(
                    name.to_lowercase(),
                    Tag {
                        names: vec![name],
                        category: None,
                        version: 1,
                    },
                );
            }
        }
        self
    }

    /// Id assigned to the next created post.
    pub fn with_next_post_id(self, id: u64) -> Self {
        self.inner.lock().unwrap().next_post_id = id;
        self
    }

    /// Make every following `create_post` fail with a service error.
    pub fn fail_post_creation(&self) {
        self.inner.lock().unwrap().fail_post_creation = true;
    }

    /// Tag names looked up, in call order.
    pub fn lookups(&self) -> Vec<String> {
        self.inner.lock().unwrap().lookups.clone()
    }

    /// Tag names created, in call order.
    pub fn creates(&self) -> Vec<String> {
        self.inner.lock().unwrap().creates.clone()
    }

    /// Uploaded file names, in call order.
    pub fn uploaded_files(&self) -> Vec<String> {
        self.inner.lock().unwrap().uploaded_files.clone()
    }

    /// Ids of pushed posts, in call order.
    pub fn pushes(&self) -> Vec<u64> {
        self.inner.lock().unwrap().pushes.clone()
    }

    pub fn post(&self, id: u64) -> Option<Post> {
        self.inner.lock().unwrap().posts.get(&id).cloned()
    }

    pub fn post_count(&self) -> usize {
        self.inner.lock().unwrap().posts.len()
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.inner.lock().unwrap().tags.contains_key(&name.to_lowercase())
    }
}

impl ImageBoard for MemoryBoard {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_tag(&self, name: &str) -> Result<Tag, BoardError> {
        let mut state = self.inner.lock().unwrap();
        state.lookups.push(name.to_string());
        state
            .tags
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| BoardError::NotFound(format!("Tag '{name}' not found.")))
    }

    async fn create_tag(&self, name: &str) -> Result<Tag, BoardError> {
        let mut state = self.inner.lock().unwrap();
        state.creates.push(name.to_string());
        let key = name.to_lowercase();
        if state.tags.contains_key(&key) {
            return Err(BoardError::Api {
                status: 400,
                name: "TagAlreadyExistsError".to_string(),
                description: format!("Tag '{name}' already exists."),
            });
        }
        let tag = Tag {
            names: vec![name.to_string()],
            category: None,
            version: 1,
        };
        state.tags.insert(key, tag.clone());
        Ok(tag)
    }

    async fn upload_file(&self, path: &Path) -> Result<UploadToken, BoardError> {
        let filename = upload_name(path);
        let mut state = self.inner.lock().unwrap();
        state.next_upload += 1;
        let token = format!("upload-{}", state.next_upload);
        state.uploads.insert(token.clone(), filename.clone());
        state.uploaded_files.push(filename);
        Ok(UploadToken { token })
    }

    async fn create_post(&self, token: &UploadToken, safety: Safety) -> Result<Post, BoardError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_post_creation {
            return Err(BoardError::Api {
                status: 500,
                name: "InternalError".to_string(),
                description: "post creation disabled".to_string(),
            });
        }
        if state.uploads.remove(token.as_str()).is_none() {
            return Err(BoardError::Api {
                status: 400,
                name: "MissingOrExpiredRequiredFileError".to_string(),
                description: "Unknown content token.".to_string(),
            });
        }
        let id = state.next_post_id;
        state.next_post_id += 1;
        let post = Post {
            id,
            version: 1,
            safety,
            tags: Vec::new(),
            source: None,
        };
        state.posts.insert(id, post.clone());
        Ok(post)
    }

    async fn push_post(&self, post: &Post) -> Result<Post, BoardError> {
        let mut state = self.inner.lock().unwrap();
        state.pushes.push(post.id);
        let stored = state
            .posts
            .get_mut(&post.id)
            .ok_or_else(|| BoardError::NotFound(format!("Post {} not found.", post.id)))?;
        if stored.version != post.version {
            return Err(BoardError::Api {
                status: 409,
                name: "IntegrityError".to_string(),
                description: "Someone else modified this in the meantime.".to_string(),
            });
        }
        let mut updated = post.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_tag_is_not_found_and_recorded() {
        let board = MemoryBoard::new("https://b");
        let err = board.get_tag("cat").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(board.lookups(), vec!["cat"]);
    }

    #[tokio::test]
    async fn seeded_tags_resolve_case_insensitively() {
        let board = MemoryBoard::new("https://b").with_tags(["Cat"]);
        let tag = board.get_tag("cat").await.unwrap();
        assert_eq!(tag.name(), "Cat");
        assert!(board.creates().is_empty());
    }

    #[tokio::test]
    async fn post_lifecycle_bumps_version() {
        let board = MemoryBoard::new("https://b").with_next_post_id(10);
        let token = board.upload_file(Path::new("a.jpg")).await.unwrap();
        let mut post = board.create_post(&token, Safety::Safe).await.unwrap();
        assert_eq!(post.id, 10);

        post.set_sources(["https://src"]);
        let pushed = board.push_post(&post).await.unwrap();
        assert_eq!(pushed.version, 2);
        assert_eq!(board.post(10).unwrap().sources(), vec!["https://src"]);
        assert_eq!(board.pushes(), vec![10]);
    }

    #[tokio::test]
    async fn upload_records_file_name_without_reading_it() {
        let board = MemoryBoard::new("https://b");
        board
            .upload_file(Path::new("/scratch/batch-1/twitter/artist/1_1.jpg"))
            .await
            .unwrap();
        assert_eq!(board.uploaded_files(), vec!["1_1.jpg"]);
    }

    #[tokio::test]
    async fn upload_token_is_single_use() {
        let board = MemoryBoard::new("https://b");
        let token = board.upload_file(Path::new("a.jpg")).await.unwrap();
        board.create_post(&token, Safety::Safe).await.unwrap();
        assert!(board.create_post(&token, Safety::Safe).await.is_err());
    }

    #[tokio::test]
    async fn injected_post_failure() {
        let board = MemoryBoard::new("https://b");
        board.fail_post_creation();
        let token = board.upload_file(Path::new("a.jpg")).await.unwrap();
        let err = board.create_post(&token, Safety::Safe).await.unwrap_err();
        assert!(matches!(err, BoardError::Api { status: 500, .. }));
        assert_eq!(board.post_count(), 0);
    }
}
