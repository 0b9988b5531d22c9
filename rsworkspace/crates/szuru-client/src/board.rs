//! [`ImageBoard`] trait: the remote operations the importer depends on.

use std::future::Future;
use std::path::Path;

use crate::error::BoardError;
use crate::types::{Post, Safety, Tag, UploadToken};

/// Remote image-board capability.
///
/// Implementations must be `Send + Sync` so one client can be shared by
/// every command invocation.
pub trait ImageBoard: Send + Sync {
    /// Public base URL, used to build post links.
    fn base_url(&self) -> &str;

    /// Look a tag up by name. Fails with [`BoardError::NotFound`] when absent.
    fn get_tag(&self, name: &str) -> impl Future<Output = Result<Tag, BoardError>> + Send;

    /// Create a tag with the given name.
    fn create_tag(&self, name: &str) -> impl Future<Output = Result<Tag, BoardError>> + Send;

    /// Upload the file at `path` and return the token referencing it.
    /// The content is streamed, never held in memory whole.
    fn upload_file(&self, path: &Path)
    -> impl Future<Output = Result<UploadToken, BoardError>> + Send;

    /// Create a post from an upload token.
    fn create_post(
        &self,
        token: &UploadToken,
        safety: Safety,
    ) -> impl Future<Output = Result<Post, BoardError>> + Send;

    /// Persist the locally mutated tags and sources of `post`.
    fn push_post(&self, post: &Post) -> impl Future<Output = Result<Post, BoardError>> + Send;
}

/// Multipart filename for `path`: its final component, or `upload`.
pub(crate) fn upload_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}
