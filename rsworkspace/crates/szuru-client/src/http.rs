//! szurubooru REST backend for [`ImageBoard`].
//!
//! Endpoints used, relative to `<base>/api`:
//! ```text
//! GET  /tag/<name>     lookup            404 / *NotFoundError -> BoardError::NotFound
//! POST /tags           create tag
//! POST /uploads        multipart upload  -> {"token": ...}
//! POST /posts          create post from contentToken
//! PUT  /post/<id>      update tags + source (optimistic version check)
//! ```

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::board::{ImageBoard, upload_name};
use crate::error::BoardError;
use crate::types::{Post, Safety, Tag, UploadToken};

/// Connection settings for [`SzurubooruClient`].
#[derive(Debug, Clone)]
pub struct SzurubooruConfig {
    pub url: String,
    pub username: String,
    pub token: String,
    /// Category assigned to tags the importer creates. szurubooru rejects
    /// a tag creation without one.
    pub tag_category: String,
}

/// Category of a stock szurubooru install.
pub const DEFAULT_TAG_CATEGORY: &str = "default";

impl SzurubooruConfig {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            token: token.into(),
            tag_category: DEFAULT_TAG_CATEGORY.to_string(),
        }
    }

    pub fn with_tag_category(mut self, category: impl Into<String>) -> Self {
        self.tag_category = category.into();
        self
    }
}

/// [`ImageBoard`] backed by a szurubooru instance.
pub struct SzurubooruClient {
    client: Client,
    base_url: String,
    api_root: Url,
    auth_header: String,
    tag_category: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

impl SzurubooruClient {
    /// Build a client. No network call is made.
    pub fn new(config: SzurubooruConfig) -> Result<Self, BoardError> {
        let base_url = config.url.trim_end_matches('/').to_string();
        let api_root = Url::parse(&format!("{base_url}/api"))
            .map_err(|_| BoardError::InvalidUrl(config.url.clone()))?;
        if api_root.cannot_be_a_base() {
            return Err(BoardError::InvalidUrl(config.url));
        }

        let credentials = STANDARD.encode(format!("{}:{}", config.username, config.token));

        Ok(Self {
            client: Client::new(),
            base_url,
            api_root,
            auth_header: format!("Token {credentials}"),
            tag_category: config.tag_category,
        })
    }

    /// `<base>/api/<segments...>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(ACCEPT, "application/json")
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, BoardError> {
    let status = resp.status();
    if status.is_success() {
        let body = resp.bytes().await?;
        return serde_json::from_slice(&body).map_err(|e| BoardError::Decode(e.to_string()));
    }

    let body: ErrorBody = resp.json().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND || body.name.ends_with("NotFoundError") {
        let message = if body.description.is_empty() {
            body.title
        } else {
            body.description
        };
        return Err(BoardError::NotFound(message));
    }

    let name = if body.name.is_empty() {
        status.to_string()
    } else {
        body.name
    };
    Err(BoardError::Api {
        status: status.as_u16(),
        name,
        description: body.description,
    })
}

impl ImageBoard for SzurubooruClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_tag(&self, name: &str) -> Result<Tag, BoardError> {
        let resp = self
            .request(Method::GET, self.endpoint(&["tag", name]))
            .send()
            .await?;
        decode(resp).await
    }

    async fn create_tag(&self, name: &str) -> Result<Tag, BoardError> {
        let body = json!({ "names": [name], "category": self.tag_category });

        debug!(tag = %name, "Creating tag");
        let resp = self
            .request(Method::POST, self.endpoint(&["tags"]))
            .json(&body)
            .send()
            .await?;
        decode(resp).await
    }

    async fn upload_file(&self, path: &Path) -> Result<UploadToken, BoardError> {
        let io_error = |source: std::io::Error| BoardError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(io_error)?;
        let size = file.metadata().await.map_err(io_error)?.len();
        let filename = upload_name(path);

        debug!(%filename, size, "Uploading file");
        let part = Part::stream_with_length(Body::from(file), size).file_name(filename);
        let form = Form::new().part("content", part);
        let resp = self
            .request(Method::POST, self.endpoint(&["uploads"]))
            .multipart(form)
            .send()
            .await?;
        decode(resp).await
    }

    async fn create_post(&self, token: &UploadToken, safety: Safety) -> Result<Post, BoardError> {
        let body = json!({
            "tags": [],
            "safety": safety.as_str(),
            "contentToken": token.as_str(),
        });
        let resp = self
            .request(Method::POST, self.endpoint(&["posts"]))
            .json(&body)
            .send()
            .await?;
        decode(resp).await
    }

    async fn push_post(&self, post: &Post) -> Result<Post, BoardError> {
        let body = json!({
            "version": post.version,
            "tags": post.tag_names(),
            "source": post.source.clone().unwrap_or_default(),
        });
        let id = post.id.to_string();
        let resp = self
            .request(Method::PUT, self.endpoint(&["post", &id]))
            .json(&body)
            .send()
            .await?;
        decode(resp).await
    }
}
