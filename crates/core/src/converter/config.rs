//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::TranscodeProfile;

/// Configuration for the FFmpeg-based converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Timeout for a single conversion job in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Characters of ffmpeg stderr kept for error reports.
    #[serde(default = "default_stderr_tail")]
    pub stderr_tail_chars: usize,

    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_timeout() -> u64 {
    1800
}

fn default_log_level() -> String {
    "warning".to_string()
}

fn default_stderr_tail() -> usize {
    3000
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            timeout_secs: default_timeout(),
            ffmpeg_log_level: default_log_level(),
            stderr_tail_chars: default_stderr_tail(),
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl ConverterConfig {
    /// Creates a new config with a custom ffmpeg path.
    pub fn with_ffmpeg_path(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ..Default::default()
        }
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Encoding targets for normalization and compression.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default)]
    pub audio: AudioTarget,
    #[serde(default)]
    pub compression: CompressionProfile,
}

/// Canonical encoding of audio deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTarget {
    #[serde(default = "default_audio_bitrate")]
    pub bitrate_kbps: u32,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,
}

fn default_audio_bitrate() -> u32 {
    192
}

fn default_sample_rate() -> u32 {
    44100
}

impl Default for AudioTarget {
    fn default() -> Self {
        Self {
            bitrate_kbps: default_audio_bitrate(),
            sample_rate_hz: default_sample_rate(),
        }
    }
}

impl AudioTarget {
    pub fn profile(&self) -> TranscodeProfile {
        TranscodeProfile::Mp3 {
            bitrate_kbps: self.bitrate_kbps,
            sample_rate_hz: self.sample_rate_hz,
        }
    }
}

/// The reduced profile used when an artifact is over the ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionProfile {
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate_kbps: u32,
    #[serde(default = "default_compressed_audio_bitrate")]
    pub audio_bitrate_kbps: u32,
    /// Bitrate for audio-only artifacts.
    #[serde(default = "default_audio_only_bitrate")]
    pub audio_only_bitrate_kbps: u32,
    /// Appended to the file stem of the compressed output.
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

fn default_max_height() -> u32 {
    360
}

fn default_video_bitrate() -> u32 {
    1000
}

fn default_compressed_audio_bitrate() -> u32 {
    128
}

fn default_audio_only_bitrate() -> u32 {
    64
}

fn default_suffix() -> String {
    "_compressed".to_string()
}

impl Default for CompressionProfile {
    fn default() -> Self {
        Self {
            max_height: default_max_height(),
            video_bitrate_kbps: default_video_bitrate(),
            audio_bitrate_kbps: default_compressed_audio_bitrate(),
            audio_only_bitrate_kbps: default_audio_only_bitrate(),
            suffix: default_suffix(),
        }
    }
}

impl CompressionProfile {
    /// Picks the audio or video variant for a file extension.
    pub fn profile_for(&self, extension: &str) -> TranscodeProfile {
        match extension {
            "mp3" | "m4a" | "aac" | "ogg" | "opus" | "wav" | "flac" => {
                TranscodeProfile::CompressedAudio {
                    bitrate_kbps: self.audio_only_bitrate_kbps,
                }
            }
            _ => TranscodeProfile::CompressedVideo {
                max_height: self.max_height,
                video_bitrate_kbps: self.video_bitrate_kbps,
                audio_bitrate_kbps: self.audio_bitrate_kbps,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.timeout_secs, 1800);
        assert_eq!(config.ffmpeg_log_level, "warning");
    }

    #[test]
    fn test_builder_methods() {
        let config = ConverterConfig::with_ffmpeg_path(PathBuf::from("/opt/ffmpeg")).with_timeout(60);
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_compression_profile_for_extension() {
        let profile = CompressionProfile::default();
        assert_eq!(
            profile.profile_for("mp4"),
            TranscodeProfile::CompressedVideo {
                max_height: 360,
                video_bitrate_kbps: 1000,
                audio_bitrate_kbps: 128,
            }
        );
        assert_eq!(
            profile.profile_for("mp3"),
            TranscodeProfile::CompressedAudio { bitrate_kbps: 64 }
        );
    }

    #[test]
    fn test_deserialize_partial_media_config() {
        let toml = r#"
[audio]
bitrate_kbps = 320

[compression]
max_height = 480
"#;
        let config: MediaConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.audio.bitrate_kbps, 320);
        assert_eq!(config.audio.sample_rate_hz, 44100);
        assert_eq!(config.compression.max_height, 480);
        assert_eq!(config.compression.suffix, "_compressed");
    }
}
