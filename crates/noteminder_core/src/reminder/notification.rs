//! Notification text derived from note markdown.
//!
//! Rules:
//! - `title`: first non-blank line with markdown symbols stripped, falling
//!   back to a generic label.
//! - `body`: remaining lines flattened to plain text, at most
//!   `BODY_MAX_CHARS` characters.

use once_cell::sync::Lazy;
use regex::Regex;

const TITLE_MAX_CHARS: usize = 80;
const BODY_MAX_CHARS: usize = 140;
const FALLBACK_TITLE: &str = "Reminder";

static MARKDOWN_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*]\(([^)]+)\)").expect("valid image regex"));
static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link regex"));
static TASK_BOX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[-*]\s+\[[ xX]\]\s*").expect("valid task box regex"));
static MARKDOWN_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\*_`#>~\[\]]+"#).expect("valid markdown symbol regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Title and body shown for a fired reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

impl NotificationContent {
    pub fn from_text(text: &str) -> Self {
        let mut lines = text.lines().skip_while(|line| line.trim().is_empty());
        let title = lines
            .next()
            .map(|line| plain_text(line, TITLE_MAX_CHARS))
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());
        let rest = lines.collect::<Vec<_>>().join("\n");

        Self {
            title,
            body: plain_text(&rest, BODY_MAX_CHARS),
        }
    }
}

fn plain_text(source: &str, max_chars: usize) -> String {
    let without_images = MARKDOWN_IMAGE_RE.replace_all(source, " ");
    let without_links = MARKDOWN_LINK_RE.replace_all(&without_images, "$1");
    let without_boxes = TASK_BOX_RE.replace_all(&without_links, "");
    let without_symbols = MARKDOWN_SYMBOL_RE.replace_all(&without_boxes, " ");
    let normalized = WHITESPACE_RE.replace_all(&without_symbols, " ");
    normalized.trim().chars().take(max_chars).collect()
}
