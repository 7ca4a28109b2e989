//! HTML captions for delivered media.
//!
//! Every field falls back to `N/A` when the resolver did not provide it.
//!
//! Telegram counts the caption limit on the text left after entity parsing,
//! so each free-text field is clipped as plain text before escaping. The
//! assembled HTML is never cut.

use chrono::{DateTime, NaiveDate};

use crate::resolver::AssetMetadata;

/// Longest caption the Bot API accepts on media messages.
pub const CAPTION_LIMIT: usize = 1024;

const TITLE_LIMIT: usize = 200;
const NAME_LIMIT: usize = 80;
const URL_LIMIT: usize = 150;
const PERSON_LIMIT: usize = 64;
const PROMPT_LIMIT: usize = 600;
const NOT_AVAILABLE: &str = "N/A";

/// `MM:SS`, or `HH:MM:SS` when the duration reaches an hour.
pub fn format_duration(duration_secs: Option<f64>) -> String {
    let Some(secs) = duration_secs.filter(|s| s.is_finite() && *s >= 0.0) else {
        return NOT_AVAILABLE.to_string();
    };
    let total = secs as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Thousands-separated count, e.g. `1,234,567`.
pub fn format_count(count: Option<u64>) -> String {
    let Some(count) = count else {
        return NOT_AVAILABLE.to_string();
    };
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Size in megabytes, e.g. `12.34 MB`.
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Upload date (`YYYY/MM/DD`) and time (`HH:MM:SS`, UTC).
///
/// Prefers the exact timestamp; a bare `YYYYMMDD` upload date yields a date
/// without a time.
pub fn format_upload(asset: &AssetMetadata) -> (String, String) {
    if let Some(dt) = asset.timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0)) {
        return (
            dt.format("%Y/%m/%d").to_string(),
            dt.format("%H:%M:%S").to_string(),
        );
    }
    if let Some(date) = asset
        .upload_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
    {
        return (date.format("%Y/%m/%d").to_string(), NOT_AVAILABLE.to_string());
    }
    (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string())
}

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

/// Clips plain text, then escapes it.
fn field(text: &str, max_chars: usize) -> String {
    escape_html(&clip(text, max_chars))
}

fn channel_line(asset: &AssetMetadata) -> String {
    let name = field(asset.uploader(), NAME_LIMIT);
    match asset.channel_url.as_deref() {
        Some(url) => format!("<a href=\"{}\">{}</a>", escape_html(url), name),
        None => name,
    }
}

/// Caption for an audio or video delivery.
pub fn media_caption(
    icon: &str,
    asset: &AssetMetadata,
    size_bytes: u64,
    requester: &str,
    bot_name: &str,
) -> String {
    let (date, time) = format_upload(asset);
    let watch = asset
        .watch_url()
        .map(|u| field(&u, URL_LIMIT))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    format!(
        "{icon} <b>{title}</b>\n\n\
         👤 Channel: {channel}\n\
         🔗 Watch: {watch}\n\
         🏷 Category: {category}\n\
         📅 Uploaded: {date}\n\
         🕒 Time: {time}\n\
         ⏱ Length: {duration}\n\
         👁 Views: {views}\n\
         👍 Likes: {likes}  👎 Dislikes: {dislikes}\n\
         💬 Comments: {comments}\n\
         📦 Size: {size}\n\n\
         🙋 Requested by: {requester}\n\
         🤖 Uploaded by: {bot}",
        icon = icon,
        title = field(asset.title(), TITLE_LIMIT),
        channel = channel_line(asset),
        watch = watch,
        category = field(asset.category(), NAME_LIMIT),
        date = date,
        time = time,
        duration = format_duration(asset.duration_secs),
        views = format_count(asset.view_count),
        likes = format_count(asset.like_count),
        dislikes = format_count(asset.dislike_count),
        comments = format_count(asset.comment_count),
        size = format_size(size_bytes),
        requester = field(requester, PERSON_LIMIT),
        bot = field(bot_name, PERSON_LIMIT),
    )
}

/// Message sent instead of a file that stayed over the ceiling.
pub fn link_caption(
    asset: &AssetMetadata,
    url: &str,
    size_bytes: u64,
    ceiling_bytes: u64,
    requester: &str,
) -> String {
    format!(
        "⚠️ <b>{title}</b> is too large to upload ({size}, limit {limit}).\n\n\
         🔗 <a href=\"{url}\">Download link</a>\n\
         ⏱ Length: {duration}\n\n\
         🙋 Requested by: {requester}",
        title = field(asset.title(), TITLE_LIMIT),
        size = format_size(size_bytes),
        limit = format_size(ceiling_bytes),
        url = escape_html(url),
        duration = format_duration(asset.duration_secs),
        requester = field(requester, PERSON_LIMIT),
    )
}

/// Caption for a generated image.
pub fn image_caption(prompt: &str, model_label: &str, elapsed_secs: f64, requester: &str) -> String {
    format!(
        "🎨 <b>Prompt:</b> {prompt}\n\
         🧠 <b>Model:</b> {model}\n\
         ⏱ <b>Time:</b> {elapsed:.1}s\n\
         🙋 <b>Requested by:</b> {requester}",
        prompt = field(prompt, PROMPT_LIMIT),
        model = field(model_label, NAME_LIMIT),
        elapsed = elapsed_secs,
        requester = field(requester, PERSON_LIMIT),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> AssetMetadata {
        AssetMetadata {
            source: "sanam re".to_string(),
            id: Some("abc".to_string()),
            title: Some("Sanam Re <Official>".to_string()),
            uploader: Some("T-Series".to_string()),
            duration_secs: Some(185.0),
            view_count: Some(1_234_567),
            timestamp: Some(1_700_000_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Some(185.0)), "03:05");
        assert_eq!(format_duration(Some(3725.4)), "01:02:05");
        assert_eq!(format_duration(Some(0.0)), "00:00");
        assert_eq!(format_duration(None), "N/A");
        assert_eq!(format_duration(Some(f64::NAN)), "N/A");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(Some(0)), "0");
        assert_eq!(format_count(Some(999)), "999");
        assert_eq!(format_count(Some(1000)), "1,000");
        assert_eq!(format_count(Some(1_234_567)), "1,234,567");
        assert_eq!(format_count(None), "N/A");
    }

    #[test]
    fn test_format_upload() {
        assert_eq!(
            format_upload(&asset()),
            ("2023/11/14".to_string(), "22:13:20".to_string())
        );

        let dated = AssetMetadata {
            upload_date: Some("20200131".to_string()),
            ..Default::default()
        };
        assert_eq!(
            format_upload(&dated),
            ("2020/01/31".to_string(), "N/A".to_string())
        );
        assert_eq!(
            format_upload(&AssetMetadata::default()),
            ("N/A".to_string(), "N/A".to_string())
        );
    }

    #[test]
    fn test_media_caption_fields() {
        let caption = media_caption("🎵", &asset(), 3 * 1024 * 1024, "alice", "Courier");
        assert!(caption.contains("<b>Sanam Re &lt;Official&gt;</b>"));
        assert!(caption.contains("Channel: T-Series"));
        assert!(caption.contains("Watch: https://youtu.be/abc"));
        assert!(caption.contains("Length: 03:05"));
        assert!(caption.contains("Views: 1,234,567"));
        assert!(caption.contains("Likes: N/A"));
        assert!(caption.contains("Size: 3.00 MB"));
        assert!(caption.contains("Requested by: alice"));
    }

    /// Text Telegram counts against the limit: tags removed, entities decoded.
    fn visible_text(html: &str) -> String {
        let mut out = String::new();
        let mut in_tag = false;
        for c in html.chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                _ if !in_tag => out.push(c),
                _ => {}
            }
        }
        out.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
    }

    #[test]
    fn test_caption_is_clipped() {
        let long = AssetMetadata {
            id: Some("i".repeat(500)),
            title: Some("x".repeat(5000)),
            uploader: Some("u".repeat(500)),
            categories: vec!["y".repeat(2000)],
            ..Default::default()
        };
        let caption = media_caption("🎬", &long, 0, &"r".repeat(300), &"b".repeat(300));
        assert!(visible_text(&caption).chars().count() <= CAPTION_LIMIT);
        assert!(caption.ends_with(&format!("Uploaded by: {}…", "b".repeat(PERSON_LIMIT - 1))));
    }

    #[test]
    fn test_escape_heavy_title_keeps_markup_intact() {
        let noisy = AssetMetadata {
            title: Some("&".repeat(200)),
            uploader: Some("<<>>".repeat(50)),
            channel_url: Some("https://youtube.com/@x".to_string()),
            ..Default::default()
        };

        let caption = media_caption("🎵", &noisy, 1024, "alice", "Courier");
        assert!(caption.contains(&format!("<b>{}</b>", "&amp;".repeat(200))));
        assert!(caption.contains("</a>"));
        assert!(caption.ends_with("Uploaded by: Courier"));
        assert!(visible_text(&caption).chars().count() <= CAPTION_LIMIT);

        let link = link_caption(&noisy, "https://cdn.example/a", 10, 5, "alice");
        assert!(link.ends_with("Requested by: alice"));
        assert!(visible_text(&link).chars().count() <= CAPTION_LIMIT);
    }

    #[test]
    fn test_link_caption() {
        let caption = link_caption(&asset(), "https://cdn.example/a?x=1&y=2", 2_254_857_830, 2_040_109_465, "carol");
        assert!(caption.contains("href=\"https://cdn.example/a?x=1&amp;y=2\""));
        assert!(caption.contains("too large"));
    }

    #[test]
    fn test_image_caption() {
        let caption = image_caption("a cat", "SDXL 1.0", 12.34, "dave");
        assert!(caption.contains("a cat"));
        assert!(caption.contains("SDXL 1.0"));
        assert!(caption.contains("12.3s"));
    }
}
