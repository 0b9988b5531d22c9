//! Per-batch scratch directory.
//!
//! Each batch downloads into its own directory under the configured root,
//! so concurrent batches never see each other's files. The directory is
//! removed by [`ScratchDir::release`] on success, and by `Drop` on every
//! other path (early return, error, panic, cancelled future).

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::ImportError;

pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create `root` if needed and a fresh `batch-*` directory inside it.
    pub async fn create(root: &Path) -> Result<Self, ImportError> {
        let root: PathBuf = root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&root).map_err(|e| ImportError::io(&root, e))?;
            tempfile::Builder::new()
                .prefix("batch-")
                .tempdir_in(&root)
                .map_err(|e| ImportError::io(&root, e))
        })
        .await??;

        debug!(path = %dir.path().display(), "Scratch directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory on a blocking worker, reporting failures.
    pub async fn release(self) -> Result<(), ImportError> {
        let path = self.dir.path().to_path_buf();
        let dir = self.dir;
        tokio::task::spawn_blocking(move || dir.close())
            .await?
            .map_err(|e| ImportError::io(&path, e))?;
        debug!(path = %path.display(), "Scratch directory removed");
        Ok(())
    }
}
