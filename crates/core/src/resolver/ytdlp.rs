//! yt-dlp backed resolver.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::config::ResolverConfig;
use super::error::ResolverError;
use super::traits::Resolver;
use super::types::{AssetMetadata, FetchReport, FormatSpec, ResolveTarget};
use crate::retry::truncate_tail;

const PROGRESS_TAG: &str = "[courier]";
const POLL_INTERVAL: Duration = Duration::from_millis(200);

static TEMPLATE_PROGRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[courier\]\s+(\d+|NA)\s+(\d+|NA)\s+([\d.]+|NA)").unwrap()
});

static DEFAULT_PROGRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[download\]\s+([\d.]+)%\s+of\s+~?\s*([\d.]+)(B|KiB|MiB|GiB)").unwrap()
});

/// Parses a yt-dlp progress line into `(downloaded, total)`.
///
/// Understands the machine-readable template this resolver requests as well
/// as yt-dlp's default `[download]  45.2% of 10.00MiB at ...` form.
pub fn parse_progress_line(line: &str) -> Option<(u64, Option<u64>)> {
    if let Some(caps) = TEMPLATE_PROGRESS.captures(line.trim()) {
        let downloaded = caps.get(1)?.as_str().parse::<u64>().ok()?;
        let total = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .or_else(|| {
                caps.get(3)
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                    .map(|f| f as u64)
            });
        return Some((downloaded, total));
    }

    let caps = DEFAULT_PROGRESS.captures(line)?;
    let percent = caps.get(1)?.as_str().parse::<f64>().ok()?.clamp(0.0, 100.0);
    let amount = caps.get(2)?.as_str().parse::<f64>().ok()?;
    let multiplier = match caps.get(3)?.as_str() {
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    let total = (amount * multiplier) as u64;
    Some(((total as f64 * percent / 100.0) as u64, Some(total)))
}

enum StreamLine {
    Stdout(String),
    Stderr(String),
}

struct RunOutput {
    status: ExitStatus,
    stderr_tail: String,
}

/// Resolver that shells out to yt-dlp.
pub struct YtDlpResolver {
    config: ResolverConfig,
}

impl YtDlpResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ResolverConfig::default())
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string(), "--no-playlist".to_string()];
        if let Some(ref cookies) = self.config.cookies_file {
            args.extend(["--cookies".to_string(), cookies.to_string_lossy().to_string()]);
        }
        if let Some(ref agent) = self.config.user_agent {
            args.extend(["--user-agent".to_string(), agent.clone()]);
        }
        args
    }

    fn resolve_args(&self, target: &ResolveTarget) -> Vec<String> {
        let mut args = vec!["--dump-single-json".to_string(), "--skip-download".to_string()];
        args.extend(self.common_args());
        args.push(target.as_query());
        args
    }

    fn fetch_args(&self, locator: &str, format: &FormatSpec, dest_dir: &Path) -> Vec<String> {
        let mut args = vec!["-f".to_string(), format.selector.clone()];
        if let Some(ref container) = format.merge_into {
            args.extend(["--merge-output-format".to_string(), container.clone()]);
        }
        args.extend([
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            format!(
                "download:{} %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s",
                PROGRESS_TAG
            ),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "-o".to_string(),
            dest_dir.join("%(id)s.%(ext)s").to_string_lossy().to_string(),
        ]);
        args.extend(self.common_args());
        args.push(locator.to_string());
        args
    }

    fn spawn_error(&self, e: std::io::Error) -> ResolverError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ResolverError::ToolNotFound {
                path: self.config.ytdlp_path.clone(),
            }
        } else {
            ResolverError::Io(e)
        }
    }

    /// Runs yt-dlp, feeding every output line to `on_line`, and kills it
    /// once `deadline` has passed.
    fn run(
        &self,
        args: &[String],
        deadline: Duration,
        mut on_line: impl FnMut(bool, &str),
    ) -> Result<RunOutput, ResolverError> {
        debug!(?args, "Running yt-dlp");
        let mut child = Command::new(&self.config.ytdlp_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            let tx = tx.clone();
            thread::spawn(move || {
                for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                    if tx.send(StreamLine::Stdout(line)).is_err() {
                        break;
                    }
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = tx.clone();
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    if tx.send(StreamLine::Stderr(line)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let tail_chars = self.config.stderr_tail_chars;
        let started = Instant::now();
        let mut stderr_log = String::new();

        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(StreamLine::Stdout(line)) => on_line(false, &line),
                Ok(StreamLine::Stderr(line)) => {
                    on_line(true, &line);
                    stderr_log.push_str(&line);
                    stderr_log.push('\n');
                    if stderr_log.len() > tail_chars * 2 {
                        stderr_log = truncate_tail(&stderr_log, tail_chars);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if started.elapsed() > deadline {
                warn!(timeout_secs = deadline.as_secs(), "yt-dlp exceeded deadline, killing");
                let _ = child.kill();
                let _ = child.wait();
                return Err(ResolverError::Timeout {
                    timeout_secs: deadline.as_secs(),
                });
            }
        }

        let status = child.wait()?;
        Ok(RunOutput {
            status,
            stderr_tail: truncate_tail(stderr_log.trim(), tail_chars),
        })
    }
}

impl Resolver for YtDlpResolver {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    fn resolve(&self, target: &ResolveTarget) -> Result<AssetMetadata, ResolverError> {
        let args = self.resolve_args(target);
        let mut json = String::new();
        let output = self.run(
            &args,
            Duration::from_secs(self.config.resolve_timeout_secs),
            |is_stderr, line| {
                if !is_stderr {
                    json.push_str(line);
                }
            },
        )?;

        if !output.status.success() {
            return Err(ResolverError::from_stderr(None, &output.stderr_tail));
        }

        let asset = parse_info_json(target.raw(), &json)?;
        info!(
            target = %target,
            id = asset.id.as_deref().unwrap_or("-"),
            title = asset.title(),
            "Resolved asset"
        );
        Ok(asset)
    }

    fn fetch(
        &self,
        asset: &AssetMetadata,
        format: &FormatSpec,
        dest_dir: &Path,
        on_progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<FetchReport, ResolverError> {
        let args = self.fetch_args(&asset.fetch_locator(), format, dest_dir);
        let mut report = FetchReport::default();

        let output = self.run(
            &args,
            Duration::from_secs(self.config.fetch_timeout_secs),
            |is_stderr, line| {
                if let Some((downloaded, total)) = parse_progress_line(line) {
                    report.bytes_downloaded = downloaded;
                    on_progress(downloaded, total);
                } else if !is_stderr && !line.trim().is_empty() {
                    report.reported_path = Some(PathBuf::from(line.trim()));
                }
            },
        )?;

        if !output.status.success() {
            return Err(ResolverError::from_stderr(
                Some(&format.selector),
                &output.stderr_tail,
            ));
        }

        debug!(
            format = %format,
            path = ?report.reported_path,
            bytes = report.bytes_downloaded,
            "Fetch finished"
        );
        Ok(report)
    }

    fn validate(&self) -> Result<(), ResolverError> {
        let output = Command::new(&self.config.ytdlp_path)
            .arg("--version")
            .output()
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(ResolverError::Failed {
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawInfo {
    #[serde(rename = "_type")]
    kind: Option<String>,
    entries: Option<Vec<RawInfo>>,
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    channel_url: Option<String>,
    uploader_url: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    ext: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    like_count: Option<u64>,
    dislike_count: Option<u64>,
    comment_count: Option<u64>,
    categories: Option<Vec<String>>,
    timestamp: Option<f64>,
    release_timestamp: Option<f64>,
    upload_date: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

/// Converts a yt-dlp info dictionary into [`AssetMetadata`].
///
/// Search results arrive as a playlist; the first entry is used.
fn parse_info_json(source: &str, json: &str) -> Result<AssetMetadata, ResolverError> {
    let mut info: RawInfo =
        serde_json::from_str(json).map_err(|e| ResolverError::Parse(e.to_string()))?;

    if info.kind.as_deref() == Some("playlist") || info.entries.is_some() {
        info = info
            .entries
            .take()
            .and_then(|entries| entries.into_iter().next())
            .ok_or_else(|| ResolverError::NotFound {
                message: format!("no results for '{}'", source),
            })?;
    }

    Ok(AssetMetadata {
        source: source.to_string(),
        id: info.id,
        title: info.title,
        uploader: info.uploader.or(info.channel),
        channel_url: info.channel_url.or(info.uploader_url),
        webpage_url: info.webpage_url,
        direct_url: info.url,
        extension: info.ext,
        duration_secs: info.duration,
        view_count: info.view_count,
        like_count: info.like_count,
        dislike_count: info.dislike_count,
        comment_count: info.comment_count,
        categories: info.categories.unwrap_or_default(),
        timestamp: info.release_timestamp.or(info.timestamp).map(|t| t as i64),
        upload_date: info.upload_date,
        filesize_approx: info.filesize.or(info.filesize_approx).map(|s| s as u64),
    })
}
