//! Client for the szurubooru image board.
//!
//! The importer only needs a handful of operations: tag lookup and
//! creation, file upload, post creation and post update. They are
//! expressed by the [`ImageBoard`] trait so the pipeline can run against
//! either the real service or an in-memory double.
//!
//! | Backend | Type | Use |
//! |---------|------|-----|
//! | szurubooru REST API | [`SzurubooruClient`] | production |
//! | in-process maps | [`MemoryBoard`] | tests, local development |
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use szuru_client::{ImageBoard, Safety, SzurubooruClient, SzurubooruConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), szuru_client::BoardError> {
//! let board = SzurubooruClient::new(SzurubooruConfig::new(
//!     "https://booru.example.com",
//!     "importer",
//!     "api-token",
//! ))?;
//!
//! let token = board.upload_file(std::path::Path::new("cat.jpg")).await?;
//! let post = board.create_post(&token, Safety::Safe).await?;
//! println!("{}", post.url(board.base_url()));
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod error;
pub mod http;
pub mod memory;
pub mod types;

pub use board::ImageBoard;
pub use error::BoardError;
pub use http::{DEFAULT_TAG_CATEGORY, SzurubooruClient, SzurubooruConfig};
pub use memory::MemoryBoard;
pub use types::{Post, PostTag, Safety, Tag, UploadToken};
