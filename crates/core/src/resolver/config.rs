//! Configuration for the resolver module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the yt-dlp backed resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Path to the yt-dlp binary.
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,

    /// Netscape-format cookies file passed to yt-dlp.
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    /// Timeout for a metadata lookup in seconds.
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_secs: u64,

    /// Timeout for a single fetch attempt in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// User agent override.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Characters of yt-dlp stderr kept for error reports.
    #[serde(default = "default_stderr_tail")]
    pub stderr_tail_chars: usize,
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_resolve_timeout() -> u64 {
    60
}

fn default_fetch_timeout() -> u64 {
    600
}

fn default_stderr_tail() -> usize {
    3000
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            cookies_file: None,
            resolve_timeout_secs: default_resolve_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            user_agent: None,
            stderr_tail_chars: default_stderr_tail(),
        }
    }
}

impl ResolverConfig {
    pub fn with_ytdlp_path(mut self, path: PathBuf) -> Self {
        self.ytdlp_path = path;
        self
    }

    pub fn with_fetch_timeout(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }
}
