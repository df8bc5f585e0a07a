//! Single-pass deduplication of collected items.
//!
//! Two independent keys are checked per item, in order:
//!
//! 1. the URL (when non-blank), compared verbatim after trimming
//!    surrounding whitespace (no other canonicalization);
//! 2. a content hash over the non-empty title, summary, and content joined
//!    by a space (see [`Item::joined_text`]).
//!
//! An item is dropped as soon as either key has been seen. Keys of kept
//! items are recorded; an item dropped on its URL does not record its text
//! hash. Items with neither a URL nor any text have no key and are always
//! kept. Output preserves first-seen order.

use std::collections::HashSet;

use crate::identity::{is_duplicate, ContentHash};
use crate::models::Item;

/// Why an item was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Url,
    Text,
}

/// Result of [`dedupe_with_report`].
#[derive(Debug, Clone, Default)]
pub struct DedupReport {
    pub unique: Vec<Item>,
    pub dropped_by_url: usize,
    pub dropped_by_text: usize,
}

impl DedupReport {
    pub fn dropped(&self) -> usize {
        self.dropped_by_url + self.dropped_by_text
    }
}

/// Keys seen so far in one dedup pass.
#[derive(Debug, Default)]
struct SeenKeys {
    urls: HashSet<String>,
    texts: HashSet<ContentHash>,
}

impl SeenKeys {
    /// Check `item` against the seen keys and record its keys if kept.
    fn admit(&mut self, item: &Item) -> Option<DropReason> {
        let url = item.url.as_deref().map(str::trim).filter(|u| !u.is_empty());

        if let Some(url) = url {
            if self.urls.contains(url) {
                return Some(DropReason::Url);
            }
            self.urls.insert(url.to_string());
        }

        let text = item.joined_text();
        if !text.is_empty() {
            let digest = ContentHash::of_text(&text);
            if is_duplicate(&self.texts, &digest) {
                return Some(DropReason::Text);
            }
            self.texts.insert(digest);
        }

        None
    }
}

/// Remove duplicates, keeping the first occurrence of each.
///
/// Idempotent: `dedupe(dedupe(items)) == dedupe(items)`.
pub fn dedupe(items: Vec<Item>) -> Vec<Item> {
    dedupe_with_report(items).unique
}

/// [`dedupe`], also counting what was dropped and why.
pub fn dedupe_with_report(items: Vec<Item>) -> DedupReport {
    let mut seen = SeenKeys::default();
    let mut report = DedupReport {
        unique: Vec::with_capacity(items.len()),
        ..Default::default()
    };

    for item in items {
        match seen.admit(&item) {
            None => report.unique.push(item),
            Some(DropReason::Url) => report.dropped_by_url += 1,
            Some(DropReason::Text) => report.dropped_by_text += 1,
        }
    }

    report
}
