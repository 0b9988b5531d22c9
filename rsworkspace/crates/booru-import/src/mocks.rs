//! Test doubles for the pipeline.
//!
//! Enabled with the `test-support` feature:
//!
//! ```toml
//! [dev-dependencies]
//! booru-import = { path = "...", features = ["test-support"] }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::ImportError;
use crate::gallery::{Downloader, DownloaderOutput};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// A media file the scripted downloader writes, with its optional sidecar.
#[derive(Debug, Clone)]
pub struct FixtureFile {
    pub name: String,
    pub sidecar: Option<String>,
}

impl FixtureFile {
    pub fn new(name: impl Into<String>, sidecar_json: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sidecar: Some(sidecar_json.into()),
        }
    }

    pub fn without_sidecar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sidecar: None,
        }
    }

    /// Sidecar with `author.name` and `hashtags` set.
    pub fn tagged(name: impl Into<String>, author: &str, hashtags: &[&str]) -> Self {
        let sidecar = serde_json::json!({
            "author": { "name": author },
            "hashtags": hashtags,
        });
        Self::new(name, sidecar.to_string())
    }

    /// Write the media file (and sidecar) into `dir`, returning the media path.
    pub fn write_into(&self, dir: &Path) -> PathBuf {
        let path = dir.join(&self.name);
        std::fs::write(&path, b"fixture-bytes").unwrap();
        if let Some(sidecar) = &self.sidecar {
            std::fs::write(crate::metadata::sidecar_path(&path), sidecar).unwrap();
        }
        path
    }
}

// ── ScriptedDownloader ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Script {
    Stdout(String),
    Fail { status: i32, output: String },
    Files(Vec<FixtureFile>),
}

/// One recorded downloader invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCall {
    pub url: String,
    pub dest: PathBuf,
    pub extra_args: Vec<String>,
}

/// [`Downloader`] that replays per-URL scripts instead of spawning a process.
///
/// URLs without a script succeed with empty output.
#[derive(Clone, Default)]
pub struct ScriptedDownloader {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    calls: Arc<Mutex<Vec<DownloadCall>>>,
}

impl ScriptedDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed with `stdout` verbatim.
    pub fn stdout(&self, url: &str, stdout: &str) {
        self.set(url, Script::Stdout(stdout.to_string()));
    }

    /// Exit with `status`, printing `output`.
    pub fn fail(&self, url: &str, status: i32, output: &str) {
        self.set(
            url,
            Script::Fail {
                status,
                output: output.to_string(),
            },
        );
    }

    /// Write `files` into the destination and report them as `# <path>` lines.
    pub fn files(&self, url: &str, files: Vec<FixtureFile>) {
        self.set(url, Script::Files(files));
    }

    pub fn calls(&self) -> Vec<DownloadCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn set(&self, url: &str, script: Script) {
        self.scripts.lock().unwrap().insert(url.to_string(), script);
    }
}

impl Downloader for ScriptedDownloader {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        extra_args: &[String],
    ) -> Result<DownloaderOutput, ImportError> {
        self.calls.lock().unwrap().push(DownloadCall {
            url: url.to_string(),
            dest: dest.to_path_buf(),
            extra_args: extra_args.to_vec(),
        });

        let script = self.scripts.lock().unwrap().get(url).cloned();
        let (success, status, stdout) = match script {
            None => (true, 0, String::new()),
            Some(Script::Stdout(out)) => (true, 0, out),
            Some(Script::Fail { status, output }) => (false, status, output),
            Some(Script::Files(files)) => {
                let mut out = format!("[scripted] {url}\n");
                for file in &files {
                    let path = file.write_into(dest);
                    out.push_str(&format!("# {}\n", path.display()));
                }
                (true, 0, out)
            }
        };

        Ok(DownloaderOutput {
            success,
            status: Some(status),
            stdout,
            stderr: String::new(),
        })
    }
}
