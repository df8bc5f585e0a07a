//! Text normalization applied before embedding.
//!
//! Removes markup and noise without interpreting the text: HTML tags,
//! URLs, e-mail addresses, and emoji are replaced with spaces, everything
//! except word characters, whitespace, and `-` is dropped, and runs of
//! whitespace collapse to a single space. Lowercasing uses Unicode case
//! mapping and is independent of the process locale.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Item;

static HTML_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+@\S+").expect("valid regex"));
static EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[\u{1F600}-\u{1F64F}\u{1F300}-\u{1F5FF}\u{1F680}-\u{1F6FF}\u{1F1E0}-\u{1F1FF}]+")
        .expect("valid regex")
});
static SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s\-]").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalize one text field.
pub fn clean_text(text: &str) -> String {
    let text = text.to_lowercase();
    let text = HTML_RE.replace_all(&text, " ");
    let text = URL_RE.replace_all(&text, " ");
    let text = EMAIL_RE.replace_all(&text, " ");
    let text = EMOJI_RE.replace_all(&text, " ");
    let text = SYMBOL_RE.replace_all(&text, " ");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Apply [`clean_text`] to an item's title, summary, and content.
pub fn clean_item(mut item: Item) -> Item {
    item.title = clean_text(&item.title);
    item.summary = clean_text(&item.summary);
    item.content = clean_text(&item.content);
    item
}

/// Cut `text` to at most `max_chars` code points.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
