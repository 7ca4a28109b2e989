//! FFmpeg-based converter implementation.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::traits::Converter;
use super::types::{TranscodeJob, TranscodeProfile, TranscodeResult};
use crate::retry::truncate_tail;

/// FFmpeg-based converter implementation.
pub struct FfmpegConverter {
    config: ConverterConfig,
}

impl FfmpegConverter {
    /// Creates a new FFmpeg converter with the given configuration.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Creates a converter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    /// Builds the ffmpeg argument list for a job.
    fn build_args(&self, job: &TranscodeJob) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            job.input_path.to_string_lossy().to_string(),
        ];

        match &job.profile {
            TranscodeProfile::Mp3 {
                bitrate_kbps,
                sample_rate_hz,
            } => {
                args.extend([
                    "-vn".to_string(),
                    "-c:a".to_string(),
                    "libmp3lame".to_string(),
                    "-b:a".to_string(),
                    format!("{}k", bitrate_kbps),
                    "-ar".to_string(),
                    sample_rate_hz.to_string(),
                ]);
            }
            TranscodeProfile::CompressedAudio { bitrate_kbps } => {
                args.extend([
                    "-vn".to_string(),
                    "-c:a".to_string(),
                    "libmp3lame".to_string(),
                    "-b:a".to_string(),
                    format!("{}k", bitrate_kbps),
                ]);
            }
            TranscodeProfile::Mp4 => {
                args.extend([
                    "-c:v".to_string(),
                    "libx264".to_string(),
                    "-preset".to_string(),
                    "veryfast".to_string(),
                    "-c:a".to_string(),
                    "aac".to_string(),
                    "-movflags".to_string(),
                    "+faststart".to_string(),
                ]);
            }
            TranscodeProfile::CompressedVideo {
                max_height,
                video_bitrate_kbps,
                audio_bitrate_kbps,
            } => {
                // Never upscale; keep width even for libx264.
                args.extend([
                    "-vf".to_string(),
                    format!("scale=-2:'min({},ih)'", max_height),
                    "-c:v".to_string(),
                    "libx264".to_string(),
                    "-preset".to_string(),
                    "veryfast".to_string(),
                    "-b:v".to_string(),
                    format!("{}k", video_bitrate_kbps),
                    "-c:a".to_string(),
                    "aac".to_string(),
                    "-b:a".to_string(),
                    format!("{}k", audio_bitrate_kbps),
                    "-movflags".to_string(),
                    "+faststart".to_string(),
                ]);
            }
        }

        if let Some(ref metadata) = job.metadata {
            args.extend(metadata.to_ffmpeg_args());
        }

        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ]);
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        args.push(job.output_path.to_string_lossy().to_string());

        args
    }

    fn not_found_or_io(&self, e: std::io::Error) -> ConverterError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConverterError::FfmpegNotFound {
                path: self.config.ffmpeg_path.clone(),
            }
        } else {
            ConverterError::Io(e)
        }
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn transcode(&self, job: TranscodeJob) -> Result<TranscodeResult, ConverterError> {
        let start = Instant::now();

        if !job.input_path.is_file() {
            return Err(ConverterError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                ConverterError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        let args = self.build_args(&job);
        debug!(job_id = %job.job_id, profile = %job.profile, ?args, "Running ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.not_found_or_io(e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConverterError::conversion_failed("stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();
        let tail_chars = self.config.stderr_tail_chars;

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut log = String::new();
            while let Ok(Some(line)) = reader.next_line().await {
                log.push_str(&line);
                log.push('\n');
                if log.len() > tail_chars * 2 {
                    log = truncate_tail(&log, tail_chars);
                }
            }
            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, log))
        })
        .await;

        match result {
            Ok(Ok((status, log))) => {
                if !status.success() {
                    let log = truncate_tail(log.trim(), tail_chars);
                    return Err(ConverterError::conversion_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        if log.is_empty() { None } else { Some(log) },
                    ));
                }
            }
            Ok(Err(e)) => return Err(ConverterError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                return Err(ConverterError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        }

        let output_meta = tokio::fs::metadata(&job.output_path)
            .await
            .map_err(|_| ConverterError::conversion_failed("Output file not created", None))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            job_id = %job.job_id,
            profile = %job.profile,
            output_bytes = output_meta.len(),
            duration_ms,
            "Transcode finished"
        );

        Ok(TranscodeResult {
            job_id: job.job_id,
            output_path: job.output_path,
            output_size_bytes: output_meta.len(),
            duration_ms,
        })
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| self.not_found_or_io(e))?;

        if !output.status.success() {
            return Err(ConverterError::conversion_failed(
                "ffmpeg -version failed",
                Some(String::from_utf8_lossy(&output.stderr).into_owned()),
            ));
        }

        Ok(())
    }
}

/// Output path for a re-encode of `input` with a suffix and new extension.
pub(crate) fn sibling_output(input: &Path, suffix: &str, extension: &str) -> std::path::PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}{}.{}", stem, suffix, extension))
}
