//! Script-based language tagging.
//!
//! A lightweight [`LanguageDetector`] that inspects which Unicode scripts
//! dominate a text. It distinguishes Korean, Japanese, Chinese, Cyrillic
//! and Latin text; Latin is reported as `"en"` since the collected feeds
//! are English or Korean in practice.

use anyhow::Result;

use crate::traits::LanguageDetector;

/// Letters of one script must make up at least this share of all
/// letters for a verdict.
const MIN_SHARE: f64 = 0.3;

#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptDetector;

#[derive(Default)]
struct ScriptCounts {
    hangul: usize,
    kana: usize,
    han: usize,
    cyrillic: usize,
    latin: usize,
    total: usize,
}

fn count_scripts(text: &str) -> ScriptCounts {
    let mut counts = ScriptCounts::default();
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        counts.total += 1;
        match c as u32 {
            0xAC00..=0xD7AF | 0x1100..=0x11FF | 0x3130..=0x318F => counts.hangul += 1,
            0x3040..=0x30FF => counts.kana += 1,
            0x4E00..=0x9FFF | 0x3400..=0x4DBF => counts.han += 1,
            0x0400..=0x04FF => counts.cyrillic += 1,
            _ if c.is_ascii_alphabetic() || ('\u{00C0}'..='\u{024F}').contains(&c) => {
                counts.latin += 1
            }
            _ => {}
        }
    }
    counts
}

impl LanguageDetector for ScriptDetector {
    fn detect(&self, text: &str) -> Result<Option<String>> {
        let counts = count_scripts(text);
        if counts.total == 0 {
            return Ok(None);
        }
        let share = |n: usize| n as f64 / counts.total as f64;

        // Kana implies Japanese even when kanji dominate.
        let code = if share(counts.hangul) >= MIN_SHARE {
            Some("ko")
        } else if counts.kana > 0 && share(counts.kana + counts.han) >= MIN_SHARE {
            Some("ja")
        } else if share(counts.han) >= MIN_SHARE {
            Some("zh")
        } else if share(counts.cyrillic) >= MIN_SHARE {
            Some("ru")
        } else if share(counts.latin) >= MIN_SHARE {
            Some("en")
        } else {
            None
        };
        Ok(code.map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Option<String> {
        ScriptDetector.detect(text).unwrap()
    }

    #[test]
    fn test_detects_scripts() {
        assert_eq!(detect("2024 디자인 트렌드 리포트").as_deref(), Some("ko"));
        assert_eq!(detect("Pastel gradients are back").as_deref(), Some("en"));
        assert_eq!(detect("デザインの流行").as_deref(), Some("ja"));
        assert_eq!(detect("设计趋势").as_deref(), Some("zh"));
    }

    #[test]
    fn test_no_letters_is_undetermined() {
        assert_eq!(detect(""), None);
        assert_eq!(detect("2024 !!! 123"), None);
    }
}
