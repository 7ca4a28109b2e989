//! Transcoding through a local encoder.
//!
//! Used twice in a request's life: to normalize a fetched file into the
//! delivery encoding (mp3 for audio, mp4 for video) and to shrink an artifact
//! that exceeds the delivery ceiling.
//!
//! # Example
//!
//! ```ignore
//! use courier_core::converter::{Converter, FfmpegConverter, TranscodeJob, TranscodeProfile};
//!
//! let converter = FfmpegConverter::with_defaults();
//! converter.validate().await?;
//!
//! let job = TranscodeJob::new(
//!     "req-1",
//!     "/tmp/courier/req-1/abc.webm",
//!     "/tmp/courier/req-1/abc.mp3",
//!     TranscodeProfile::Mp3 { bitrate_kbps: 192, sample_rate_hz: 44100 },
//! );
//! let result = converter.transcode(job).await?;
//! println!("{} bytes in {} ms", result.output_size_bytes, result.duration_ms);
//! ```

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::{AudioTarget, CompressionProfile, ConverterConfig, MediaConfig};
pub use error::ConverterError;
pub use ffmpeg::FfmpegConverter;
pub(crate) use ffmpeg::sibling_output;
pub use traits::Converter;
pub use types::{EmbeddedMetadata, TranscodeJob, TranscodeProfile, TranscodeResult};
