//! Offline term-frequency topic analyzer.
//!
//! Ranks the most frequent terms across the reference items' titles and
//! summaries. It stands in for an LLM-backed analyzer when none is
//! configured and returns the same opaque JSON envelope:
//!
//! ```json
//! {"brief": "...", "references": 12, "topics": [{"term": "pastel", "count": 4}]}
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;

use trendline_core::clean::clean_text;
use trendline_core::models::Item;

use crate::traits::TopicAnalyzer;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "has", "have",
    "will", "into", "your", "our", "their", "about", "more", "new", "how", "what", "why",
];

pub struct TermFrequencyAnalyzer {
    top_n: usize,
    min_term_chars: usize,
}

impl TermFrequencyAnalyzer {
    pub fn new(top_n: usize) -> Self {
        Self {
            top_n,
            min_term_chars: 3,
        }
    }

    fn rank(&self, references: &[Item]) -> Vec<(String, usize)> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for item in references {
            let text = clean_text(&format!("{} {}", item.title, item.summary));
            for term in text.split_whitespace() {
                if term.chars().count() < self.min_term_chars
                    || STOPWORDS.contains(&term)
                    || term.chars().all(|c| c.is_ascii_digit())
                {
                    continue;
                }
                *counts.entry(term.to_string()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.top_n);
        ranked
    }
}

impl Default for TermFrequencyAnalyzer {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl TopicAnalyzer for TermFrequencyAnalyzer {
    async fn analyze(&self, brief: &str, references: &[Item]) -> Result<Value> {
        let topics: Vec<Value> = self
            .rank(references)
            .into_iter()
            .map(|(term, count)| json!({"term": term, "count": count}))
            .collect();
        Ok(json!({
            "brief": brief,
            "references": references.len(),
            "topics": topics,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trendline_core::models::Source;

    fn item(title: &str, summary: &str) -> Item {
        let mut it = Item::new(Source::News, Utc::now());
        it.title = title.to_string();
        it.summary = summary.to_string();
        it
    }

    #[tokio::test]
    async fn test_ranks_terms_by_frequency_then_name() {
        let refs = vec![
            item("Pastel gradients", "the pastel look"),
            item("Bold type and pastel", "gradients everywhere 2024"),
        ];
        let result = TermFrequencyAnalyzer::new(3)
            .analyze("spring", &refs)
            .await
            .unwrap();
        assert_eq!(result["brief"], "spring");
        assert_eq!(result["references"], 2);
        let topics = result["topics"].as_array().unwrap();
        assert_eq!(topics.len(), 3);
        assert_eq!(topics[0]["term"], "pastel");
        assert_eq!(topics[0]["count"], 3);
        assert_eq!(topics[1]["term"], "gradients");
        assert_eq!(topics[2]["term"], "bold");
    }

    #[tokio::test]
    async fn test_no_references() {
        let result = TermFrequencyAnalyzer::default().analyze("", &[]).await.unwrap();
        assert!(result["topics"].as_array().unwrap().is_empty());
    }
}
