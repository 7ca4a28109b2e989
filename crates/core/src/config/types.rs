use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::converter::{ConverterConfig, MediaConfig};
use crate::delivery::{Button, TelegramConfig};
use crate::generation::GenerationConfig;
use crate::resolver::ResolverConfig;
use crate::retry::RetryPolicy;
use crate::task::RequestKind;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub formats: FormatPreferences,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Requests allowed to run at once. 0 means no limit.
    #[serde(default)]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_requests: 0,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Where per-request directories are created.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("courier")
}

/// Delivery limits and presentation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
    /// Largest payload the gateway accepts, in bytes (default 1.9 GiB).
    #[serde(default = "default_ceiling_bytes")]
    pub ceiling_bytes: u64,
    /// Characters of diagnostic output shown to users on failure.
    #[serde(default = "default_user_tail_chars")]
    pub diagnostic_tail_chars: usize,
    /// Name shown as the uploader in captions.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Link buttons attached to every media delivery.
    #[serde(default)]
    pub buttons: Vec<Button>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            ceiling_bytes: default_ceiling_bytes(),
            diagnostic_tail_chars: default_user_tail_chars(),
            bot_name: default_bot_name(),
            buttons: Vec::new(),
        }
    }
}

fn default_ceiling_bytes() -> u64 {
    // 1.9 GiB
    (1.9 * 1024.0 * 1024.0 * 1024.0) as u64
}

fn default_user_tail_chars() -> usize {
    4000
}

fn default_bot_name() -> String {
    "Courier".to_string()
}

/// Progress display settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressConfig {
    /// Minimum time between two progress updates.
    #[serde(default = "default_throttle_interval_ms")]
    pub throttle_interval_ms: u64,
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            throttle_interval_ms: default_throttle_interval_ms(),
            bar_width: default_bar_width(),
        }
    }
}

fn default_throttle_interval_ms() -> u64 {
    1000
}

fn default_bar_width() -> usize {
    20
}

/// Ordered format selectors per request kind. The first one that works wins.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FormatPreferences {
    #[serde(default = "default_audio_formats")]
    pub audio: Vec<String>,
    #[serde(default = "default_video_formats")]
    pub video: Vec<String>,
    #[serde(default = "default_adult_formats")]
    pub adult: Vec<String>,
}

impl Default for FormatPreferences {
    fn default() -> Self {
        Self {
            audio: default_audio_formats(),
            video: default_video_formats(),
            adult: default_adult_formats(),
        }
    }
}

impl FormatPreferences {
    /// The chain for a request kind. Image requests do not fetch media.
    pub fn for_kind(&self, kind: RequestKind) -> &[String] {
        match kind {
            RequestKind::Audio => &self.audio,
            RequestKind::Video => &self.video,
            RequestKind::Adult => &self.adult,
            RequestKind::Image => &[],
        }
    }
}

fn default_audio_formats() -> Vec<String> {
    [
        "bestaudio[ext=m4a]",
        "bestaudio[ext=webm]",
        "bestaudio[ext=mp4]",
        "bestaudio",
        "best",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_video_formats() -> Vec<String> {
    ["bestvideo[ext=mp4]+bestaudio[ext=m4a]", "bestvideo+bestaudio", "best"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_adult_formats() -> Vec<String> {
    vec!["bestvideo[height<=360]+bestaudio/best[height<=360]".to_string()]
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub delivery: DeliveryConfig,
    pub telegram: SanitizedTelegramConfig,
    pub resolver: ResolverConfig,
    pub converter: ConverterConfig,
    pub media: MediaConfig,
    pub formats: FormatPreferences,
    pub retry: RetryPolicy,
    pub progress: ProgressConfig,
    pub generation: SanitizedGenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTelegramConfig {
    pub api_base: String,
    pub bot_token_configured: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGenerationConfig {
    pub api_base: String,
    pub api_token_configured: bool,
    pub timeout_secs: u64,
    pub models: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            workspace: config.workspace.clone(),
            delivery: config.delivery.clone(),
            telegram: SanitizedTelegramConfig {
                api_base: config.telegram.api_base.clone(),
                bot_token_configured: !config.telegram.bot_token.is_empty(),
                timeout_secs: config.telegram.timeout_secs,
            },
            resolver: config.resolver.clone(),
            converter: config.converter.clone(),
            media: config.media.clone(),
            formats: config.formats.clone(),
            retry: config.retry.clone(),
            progress: config.progress.clone(),
            generation: SanitizedGenerationConfig {
                api_base: config.generation.api_base.clone(),
                api_token_configured: !config.generation.api_token.is_empty(),
                timeout_secs: config.generation.timeout_secs,
                models: config.generation.models.iter().map(|m| m.id.clone()).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[telegram]
bot_token = "123:abc"
"#;

    #[test]
    fn test_deserialize_minimal_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.delivery.ceiling_bytes, 2_040_109_465);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.progress.throttle_interval_ms, 1000);
        assert_eq!(config.formats.audio[0], "bestaudio[ext=m4a]");
        assert_eq!(config.formats.video.len(), 3);
        assert_eq!(config.generation.models.len(), 3);
    }

    #[test]
    fn test_formats_for_kind() {
        let formats = FormatPreferences::default();
        assert_eq!(formats.for_kind(RequestKind::Audio).len(), 5);
        assert!(formats.for_kind(RequestKind::Adult)[0].contains("height<=360"));
        assert!(formats.for_kind(RequestKind::Image).is_empty());
    }

    #[test]
    fn test_buttons_and_overrides() {
        let toml = r#"
[telegram]
bot_token = "123:abc"

[delivery]
ceiling_bytes = 1024
bot_name = "Tester"

[[delivery.buttons]]
label = "Developer"
url = "https://t.me/example"

[formats]
audio = ["bestaudio"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.delivery.ceiling_bytes, 1024);
        assert_eq!(config.delivery.buttons.len(), 1);
        assert_eq!(config.delivery.buttons[0].label, "Developer");
        assert_eq!(config.formats.audio, vec!["bestaudio".to_string()]);
        assert_eq!(config.formats.video.len(), 3);
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("123:abc"));
        assert!(sanitized.telegram.bot_token_configured);
        assert!(!sanitized.generation.api_token_configured);
    }
}
