//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Target encoding of a transcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum TranscodeProfile {
    /// Extract the audio track to MP3.
    Mp3 { bitrate_kbps: u32, sample_rate_hz: u32 },
    /// H.264 video with AAC audio in an MP4 container.
    Mp4,
    /// Downscaled, reduced-bitrate MP4.
    CompressedVideo {
        max_height: u32,
        video_bitrate_kbps: u32,
        audio_bitrate_kbps: u32,
    },
    /// Reduced-bitrate MP3.
    CompressedAudio { bitrate_kbps: u32 },
}

impl TranscodeProfile {
    /// File extension of the output.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 { .. } | Self::CompressedAudio { .. } => "mp3",
            Self::Mp4 | Self::CompressedVideo { .. } => "mp4",
        }
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::Mp3 { .. } | Self::CompressedAudio { .. })
    }
}

impl fmt::Display for TranscodeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mp3 {
                bitrate_kbps,
                sample_rate_hz,
            } => write!(f, "mp3 {}k/{}Hz", bitrate_kbps, sample_rate_hz),
            Self::Mp4 => write!(f, "mp4 h264/aac"),
            Self::CompressedVideo {
                max_height,
                video_bitrate_kbps,
                audio_bitrate_kbps,
            } => write!(
                f,
                "mp4 {}p {}k/{}k",
                max_height, video_bitrate_kbps, audio_bitrate_kbps
            ),
            Self::CompressedAudio { bitrate_kbps } => write!(f, "mp3 {}k", bitrate_kbps),
        }
    }
}

/// Tags written into the output container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
}

impl EmbeddedMetadata {
    /// Convert to ffmpeg metadata arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref title) = self.title {
            args.extend(["-metadata".to_string(), format!("title={}", title)]);
        }
        if let Some(ref artist) = self.artist {
            args.extend(["-metadata".to_string(), format!("artist={}", artist)]);
        }
        args
    }
}

/// One transcode to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    /// Identifier used in logs, usually the request id.
    pub job_id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub profile: TranscodeProfile,
    pub metadata: Option<EmbeddedMetadata>,
}

impl TranscodeJob {
    pub fn new(
        job_id: impl Into<String>,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        profile: TranscodeProfile,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            input_path: input_path.into(),
            output_path: output_path.into(),
            profile,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: EmbeddedMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A finished transcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeResult {
    pub job_id: String,
    pub output_path: PathBuf,
    pub output_size_bytes: u64,
    pub duration_ms: u64,
}
