//! Gallery fetching through an external downloader (`gallery-dl`).
//!
//! The downloader is invoked as
//! `<program> <url> --write-metadata -D <dest> [extra-args...]`
//! and reports each file it wrote on stdout as a `# <path>` line.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::{debug, info, warn};

use crate::error::ImportError;

/// Captured result of one downloader run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloaderOutput {
    pub success: bool,
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// A downloaded media file and the URL it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedItem {
    pub path: PathBuf,
    pub origin_url: String,
}

/// Runs the external downloader for one URL.
pub trait Downloader: Send + Sync {
    fn download(
        &self,
        url: &str,
        dest: &Path,
        extra_args: &[String],
    ) -> impl Future<Output = Result<DownloaderOutput, ImportError>> + Send;
}

/// `gallery-dl` spawned as a child process.
#[derive(Debug, Clone)]
pub struct GalleryDl {
    program: String,
    leading_args: Vec<String>,
}

impl GalleryDl {
    /// `argv` is the command prefix, e.g. `["gallery-dl"]` or
    /// `["python3", "-m", "gallery_dl"]`.
    pub fn new(argv: &[String]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            leading_args: rest.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed after the program name.
    pub fn args(&self, url: &str, dest: &Path, extra_args: &[String]) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.push(url.to_string());
        args.push("--write-metadata".to_string());
        args.push("-D".to_string());
        args.push(dest.display().to_string());
        args.extend(extra_args.iter().cloned());
        args
    }
}

impl Default for GalleryDl {
    fn default() -> Self {
        Self {
            program: "gallery-dl".to_string(),
            leading_args: Vec::new(),
        }
    }
}

impl Downloader for GalleryDl {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        extra_args: &[String],
    ) -> Result<DownloaderOutput, ImportError> {
        let args = self.args(url, dest, extra_args);
        debug!(program = %self.program, ?args, "Spawning downloader");

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ImportError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        Ok(DownloaderOutput {
            success: output.status.success(),
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// File paths reported by the downloader: every `# `-prefixed line, prefix
/// removed, in output order. Other lines are ignored.
pub fn parse_paths(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("# "))
        .map(str::trim_end)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Download `url` into `dest` and return the reported files.
///
/// A non-zero exit fails with the captured output and never returns a
/// partial list. An empty list is a successful run that produced nothing.
pub async fn fetch_gallery<D: Downloader>(
    downloader: &D,
    url: &str,
    dest: &Path,
    extra_args: &[String],
) -> Result<Vec<DownloadedItem>, ImportError> {
    let output = downloader.download(url, dest, extra_args).await?;

    if !output.success {
        warn!(url, status = ?output.status, "Downloader exited unsuccessfully");
        let mut diagnostic = output.stdout;
        if !output.stderr.trim().is_empty() {
            if !diagnostic.is_empty() && !diagnostic.ends_with('\n') {
                diagnostic.push('\n');
            }
            diagnostic.push_str(&output.stderr);
        }
        return Err(ImportError::Downloader {
            status: output.status,
            output: diagnostic,
        });
    }

    let items: Vec<DownloadedItem> = parse_paths(&output.stdout)
        .into_iter()
        .map(|path| DownloadedItem {
            path,
            origin_url: url.to_string(),
        })
        .collect();

    info!(url, files = items.len(), "Gallery fetched");
    Ok(items)
}
