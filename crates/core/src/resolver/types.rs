//! Types for the resolver module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

const SEARCH_PREFIX: &str = "ytsearch1:";

/// What to hand the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveTarget {
    /// A direct locator, used as is.
    Literal(String),
    /// Free text resolved to its first search hit.
    Search(String),
}

impl ResolveTarget {
    /// The argument passed to the resolver backend.
    pub fn as_query(&self) -> String {
        match self {
            Self::Literal(url) => url.clone(),
            Self::Search(text) => format!("{}{}", SEARCH_PREFIX, text),
        }
    }

    /// The raw text the target was built from.
    pub fn raw(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Search(s) => s,
        }
    }
}

impl fmt::Display for ResolveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(url) => write!(f, "literal {}", url),
            Self::Search(text) => write!(f, "search \"{}\"", text),
        }
    }
}

/// One format selector of a fetch chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    /// Backend format selector, e.g. `bestaudio[ext=m4a]`.
    pub selector: String,
    /// Container to merge separate video and audio streams into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_into: Option<String>,
}

impl FormatSpec {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            merge_into: None,
        }
    }

    pub fn merged_into(mut self, container: impl Into<String>) -> Self {
        self.merge_into = Some(container.into());
        self
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector)
    }
}

/// Metadata of a resolved asset.
///
/// Every field except `source` is optional; the accessor methods document
/// the value used when the backend did not supply one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// Locator or query this asset was resolved from.
    pub source: String,
    pub id: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub channel_url: Option<String>,
    /// Canonical page of the asset.
    pub webpage_url: Option<String>,
    /// Direct media URL, when the backend exposes one.
    pub direct_url: Option<String>,
    /// Extension of the backend's default format.
    pub extension: Option<String>,
    pub duration_secs: Option<f64>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub dislike_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub categories: Vec<String>,
    /// Upload time as a Unix timestamp.
    pub timestamp: Option<i64>,
    /// Upload day as `YYYYMMDD`.
    pub upload_date: Option<String>,
    pub filesize_approx: Option<u64>,
}

impl AssetMetadata {
    /// Title, or `"Unknown Title"`.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown Title")
    }

    /// Uploader, or `"Unknown Channel"`.
    pub fn uploader(&self) -> &str {
        self.uploader.as_deref().unwrap_or("Unknown Channel")
    }

    /// Page URL, falling back to a short link built from the id.
    pub fn watch_url(&self) -> Option<String> {
        self.webpage_url
            .clone()
            .or_else(|| self.id.as_ref().map(|id| format!("https://youtu.be/{}", id)))
    }

    /// What the fetch step should hand the backend.
    ///
    /// The page URL when known, else the source if it is a locator, else a
    /// short link from the id. Free text is searched again as a last resort.
    pub fn fetch_locator(&self) -> String {
        if let Some(ref url) = self.webpage_url {
            return url.clone();
        }
        if self.source.starts_with("http://") || self.source.starts_with("https://") {
            return self.source.clone();
        }
        self.watch_url()
            .unwrap_or_else(|| format!("{}{}", SEARCH_PREFIX, self.source))
    }

    /// First category, or `"N/A"`.
    pub fn category(&self) -> &str {
        self.categories.first().map(String::as_str).unwrap_or("N/A")
    }
}

/// What a fetch left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Final path the backend reported writing, if it reported one.
    pub reported_path: Option<PathBuf>,
    pub bytes_downloaded: u64,
}
