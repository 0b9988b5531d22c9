//! Sidecar metadata written by `gallery-dl --write-metadata`.
//!
//! For a media file `<path>` the sidecar lives at `<path>.json`. Only a few
//! keys matter here; everything else in the object is ignored.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::ImportError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub hashtags: Option<Vec<String>>,
    /// Numeric in gallery-dl output, but accepted as a string too.
    #[serde(default)]
    pub tweet_id: Option<Value>,
}

impl Metadata {
    pub fn author_name(&self) -> Option<&str> {
        self.author
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }

    pub fn tweet_id(&self) -> Option<String> {
        match self.tweet_id.as_ref()? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// Hashtags followed by the author name, de-duplicated
    /// case-insensitively in first-occurrence order.
    ///
    /// Fails when `author.name` is absent; `sidecar` names the file in the
    /// error.
    pub fn tag_names(&self, sidecar: &Path) -> Result<Vec<String>, ImportError> {
        let author = self.author_name().ok_or_else(|| ImportError::MetadataField {
            path: sidecar.to_path_buf(),
            field: "author.name",
        })?;

        let mut names: Vec<String> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let candidates = self
            .hashtags
            .iter()
            .flatten()
            .map(String::as_str)
            .chain(std::iter::once(author));
        for name in candidates {
            let name = name.trim();
            if name.is_empty() || !seen.insert(name.to_lowercase()) {
                continue;
            }
            names.push(name.to_string());
        }
        Ok(names)
    }
}

/// `<path>.json`, keeping the media file's own extension.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(".json");
    PathBuf::from(os)
}

/// Read and parse the sidecar of `path`. A missing file is
/// [`ImportError::MetadataMissing`].
pub async fn load(path: &Path) -> Result<(PathBuf, Metadata), ImportError> {
    let sidecar = sidecar_path(path);
    let bytes = match tokio::fs::read(&sidecar).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ImportError::MetadataMissing { path: sidecar });
        }
        Err(e) => return Err(ImportError::io(sidecar, e)),
    };

    let metadata = serde_json::from_slice(&bytes).map_err(|source| ImportError::MetadataParse {
        path: sidecar.clone(),
        source,
    })?;
    Ok((sidecar, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Metadata {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn sidecar_appends_json_to_full_name() {
        assert_eq!(sidecar_path(Path::new("tmp/a.jpg")), PathBuf::from("tmp/a.jpg.json"));
        assert_eq!(sidecar_path(Path::new("noext")), PathBuf::from("noext.json"));
    }

    #[test]
    fn tags_are_hashtags_then_author() {
        let m = parse(r#"{"author":{"name":"alice"},"hashtags":["x","y"]}"#);
        assert_eq!(m.tag_names(Path::new("a.json")).unwrap(), vec!["x", "y", "alice"]);
    }

    #[test]
    fn author_matching_a_hashtag_appears_once() {
        let m = parse(r#"{"author":{"name":"Alice"},"hashtags":["alice","x","x"]}"#);
        assert_eq!(m.tag_names(Path::new("a.json")).unwrap(), vec!["alice", "x"]);
    }

    #[test]
    fn missing_hashtags_yields_author_only() {
        let m = parse(r#"{"author":{"name":"bob","nick":"Bob"},"content":"hi"}"#);
        assert_eq!(m.tag_names(Path::new("a.json")).unwrap(), vec!["bob"]);
    }

    #[test]
    fn missing_author_is_field_error() {
        let m = parse(r#"{"hashtags":["x"]}"#);
        let err = m.tag_names(Path::new("a.jpg.json")).unwrap_err();
        assert!(matches!(err, ImportError::MetadataField { field: "author.name", .. }));

        let blank = parse(r#"{"author":{"name":"  "}}"#);
        assert!(blank.tag_names(Path::new("a.jpg.json")).is_err());
    }

    #[test]
    fn tweet_id_accepts_number_or_string() {
        assert_eq!(parse(r#"{"tweet_id":1790000000000000000}"#).tweet_id().as_deref(), Some("1790000000000000000"));
        assert_eq!(parse(r#"{"tweet_id":"42"}"#).tweet_id().as_deref(), Some("42"));
        assert_eq!(parse(r#"{}"#).tweet_id(), None);
    }

    #[tokio::test]
    async fn load_reports_missing_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("a.jpg");
        let err = load(&media).await.unwrap_err();
        match err {
            ImportError::MetadataMissing { path } => assert_eq!(path, dir.path().join("a.jpg.json")),
            other => panic!("expected MetadataMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_reports_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("a.jpg");
        std::fs::write(dir.path().join("a.jpg.json"), "{not json").unwrap();
        assert!(matches!(load(&media).await, Err(ImportError::MetadataParse { .. })));
    }

    #[tokio::test]
    async fn load_parses_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("a.jpg");
        std::fs::write(
            dir.path().join("a.jpg.json"),
            r#"{"author":{"name":"alice"},"hashtags":["cat"],"tweet_id":7}"#,
        )
        .unwrap();
        let (sidecar, m) = load(&media).await.unwrap();
        assert_eq!(sidecar, dir.path().join("a.jpg.json"));
        assert_eq!(m.author_name(), Some("alice"));
        assert_eq!(m.tweet_id().as_deref(), Some("7"));
    }
}
