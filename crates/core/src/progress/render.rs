//! Text rendering of progress for chat status messages.

use super::bridge::ProgressEvent;

const FILLED: char = '█';
const EMPTY: char = '▒';

/// Bytes as megabytes with two decimals.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2}MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Renders `"{prefix}: 45.0%\n[█████████▒▒▒…]\n4.50MB / 10.00MB"`.
pub fn render_progress(prefix: &str, event: &ProgressEvent, bar_width: usize) -> String {
    let percent = event.percent();
    let filled = ((percent / 100.0) * bar_width as f64) as usize;
    let filled = filled.min(bar_width);

    let mut bar = String::with_capacity(bar_width * 3);
    bar.extend(std::iter::repeat(FILLED).take(filled));
    bar.extend(std::iter::repeat(EMPTY).take(bar_width - filled));

    let total = event.total_bytes.unwrap_or(0).max(1);
    format!(
        "{}: {:.1}%\n[{}]\n{} / {}",
        prefix,
        percent,
        bar,
        format_megabytes(event.bytes_transferred),
        format_megabytes(total)
    )
}
