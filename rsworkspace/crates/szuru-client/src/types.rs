//! Wire types for the szurubooru resources the importer touches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Content rating attached to every post.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Safety {
    #[default]
    Safe,
    Sketchy,
    Unsafe,
}

impl Safety {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Sketchy => "sketchy",
            Self::Unsafe => "unsafe",
        }
    }
}

impl fmt::Display for Safety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Safety {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "sketchy" => Ok(Self::Sketchy),
            "unsafe" => Ok(Self::Unsafe),
            other => Err(format!("unknown safety rating '{other}'")),
        }
    }
}

/// Tag resource. The first entry of `names` is the primary name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub names: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub version: u64,
}

impl Tag {
    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or_default()
    }
}

/// Micro tag resource embedded in a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostTag {
    pub names: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl From<&Tag> for PostTag {
    fn from(tag: &Tag) -> Self {
        Self {
            names: tag.names.clone(),
            category: tag.category.clone(),
        }
    }
}

/// Post resource.
///
/// Created remotely, then mutated locally (tags, sources) and written back
/// with [`ImageBoard::push_post`](crate::ImageBoard::push_post). The service
/// stores sources as one newline-separated string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: u64,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub safety: Safety,
    #[serde(default)]
    pub tags: Vec<PostTag>,
    #[serde(default)]
    pub source: Option<String>,
}

impl Post {
    /// User-facing link: `<base>/post/<id>`.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/post/{}", base_url.trim_end_matches('/'), self.id)
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags
            .iter()
            .filter_map(|t| t.names.first().map(String::as_str))
            .collect()
    }

    pub fn set_tags(&mut self, tags: &[Tag]) {
        self.tags = tags.iter().map(PostTag::from).collect();
    }

    pub fn sources(&self) -> Vec<&str> {
        self.source
            .as_deref()
            .map(|s| s.lines().filter(|l| !l.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn set_sources<I, S>(&mut self, sources: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = sources
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        self.source = (!joined.is_empty()).then_some(joined);
    }
}

/// Token returned by the upload endpoint, consumed by post creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadToken {
    pub token: String,
}

impl UploadToken {
    pub fn as_str(&self) -> &str {
        &self.token
    }
}
