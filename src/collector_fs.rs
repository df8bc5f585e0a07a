//! Filesystem JSON collector.
//!
//! Crawlers drop their output under a collection root, one directory per
//! source:
//!
//! ```text
//! data/raw/
//!   news/2024-01-02.json        ← [{"url": .., "title": .., ...}, ...]
//!   pinterest/board-a.json
//!   instagram/tag-pastel.json
//! ```
//!
//! [`discover`] turns each recognised source directory into a
//! [`SourceDirCollector`] and composes them into a [`MultiCollector`]. A
//! malformed or unreadable file is logged and skipped; a failing source
//! is logged and skipped by the composite, which only fails when every
//! source fails.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use trendline_core::models::{parse_timestamp, Item, Source};

use crate::config::CollectConfig;
use crate::error::CollectionError;
use crate::traits::Collector;

/// One entry of a crawler output file.
#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default, alias = "source_url", alias = "link")]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "description")]
    summary: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "pubDate")]
    published_at: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

impl RawItem {
    /// `None` for an entry with neither a URL nor any text.
    fn into_item(self, source: Source, collected_at: DateTime<Utc>) -> Option<Item> {
        let mut item = Item::new(source, collected_at);
        item.url = self.url.filter(|u| !u.trim().is_empty());
        item.title = self.title.unwrap_or_default();
        item.summary = self.summary.unwrap_or_default();
        item.content = self.content.unwrap_or_default();
        item.published_at = self.published_at.as_deref().and_then(parse_timestamp);
        item.language = self
            .language
            .filter(|l| !l.trim().is_empty() && l != "unknown");

        if item.url.is_none() && item.joined_text().is_empty() {
            return None;
        }
        Some(item)
    }
}

/// Collects every matching JSON file under one source directory.
pub struct SourceDirCollector {
    root: PathBuf,
    dir: PathBuf,
    source: Source,
    label: String,
    include: Arc<GlobSet>,
    exclude: Arc<GlobSet>,
}

impl SourceDirCollector {
    pub fn source(&self) -> Source {
        self.source
    }

    fn scan(&self) -> Result<Vec<Item>, CollectionError> {
        if !self.dir.is_dir() {
            return Err(CollectionError::MissingRoot(self.dir.clone()));
        }

        let collected_at = Utc::now();
        let mut items = Vec::new();
        let mut files = 0usize;

        for entry in WalkDir::new(&self.dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(source = %self.label, error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            // Apply exclude patterns
            if self.exclude.is_match(&rel_str) {
                continue;
            }

            // Apply include patterns
            if !self.include.is_match(&rel_str) {
                continue;
            }

            match read_items(path) {
                Ok(raw) => {
                    files += 1;
                    items.extend(
                        raw.into_iter()
                            .filter_map(|r| r.into_item(self.source, collected_at)),
                    );
                }
                Err(e) => {
                    warn!(source = %self.label, file = %rel_str, error = %e, "skipping malformed file");
                }
            }
        }

        debug!(source = %self.label, files, items = items.len(), "scanned source directory");
        Ok(items)
    }
}

fn read_items(path: &Path) -> anyhow::Result<Vec<RawItem>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[async_trait]
impl Collector for SourceDirCollector {
    fn name(&self) -> &str {
        &self.label
    }

    async fn collect(&self, _run_id: &str) -> Result<Vec<Item>, CollectionError> {
        self.scan()
    }
}

/// Runs several collectors and concatenates their items in order.
#[derive(Default)]
pub struct MultiCollector {
    collectors: Vec<Arc<dyn Collector>>,
}

impl MultiCollector {
    pub fn new(collectors: Vec<Arc<dyn Collector>>) -> Self {
        Self { collectors }
    }

    pub fn push(&mut self, collector: Arc<dyn Collector>) {
        self.collectors.push(collector);
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

#[async_trait]
impl Collector for MultiCollector {
    fn name(&self) -> &str {
        "multi"
    }

    async fn collect(&self, run_id: &str) -> Result<Vec<Item>, CollectionError> {
        let mut items = Vec::new();
        let mut last_failure = None;
        let mut failures = 0usize;

        for collector in &self.collectors {
            match collector.collect(run_id).await {
                Ok(batch) => {
                    info!(run_id, source = collector.name(), items = batch.len(), "collected");
                    items.extend(batch);
                }
                Err(e) => {
                    warn!(run_id, source = collector.name(), error = %e, "source failed, continuing");
                    failures += 1;
                    last_failure = Some(e);
                }
            }
        }

        if failures > 0 && failures == self.collectors.len() {
            if let Some(last) = last_failure {
                return Err(CollectionError::AllSourcesFailed {
                    attempted: failures,
                    last: Box::new(last),
                });
            }
        }

        Ok(items)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, CollectionError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Build one collector per recognised source directory under
/// `config.root`.
///
/// Directory names map to sources via [`Source`]'s parser (`news`,
/// `pinterest`, `instagram`, ...); other directories are skipped, as are
/// trend sample directories (`google_trends`), which belong to the trend
/// feed.
pub fn discover(config: &CollectConfig) -> Result<MultiCollector, CollectionError> {
    let root = &config.root;
    if !root.is_dir() {
        return Err(CollectionError::MissingRoot(root.clone()));
    }

    let include = Arc::new(build_globset(&config.include_globs)?);
    let exclude = Arc::new(build_globset(&config.exclude_globs)?);

    let entries = std::fs::read_dir(root).map_err(|source| CollectionError::Io {
        path: root.clone(),
        source,
    })?;

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let mut multi = MultiCollector::default();
    for dir in dirs {
        let label = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let source: Source = match label.parse() {
            Ok(source) => source,
            Err(_) => {
                warn!(dir = %label, "unrecognised source directory, skipping");
                continue;
            }
        };
        // Trend samples are read by the trend feed, not collected as items.
        if source == Source::Trend {
            debug!(dir = %label, "trend sample directory, skipping");
            continue;
        }
        multi.push(Arc::new(SourceDirCollector {
            root: root.clone(),
            dir,
            source,
            label,
            include: Arc::clone(&include),
            exclude: Arc::clone(&exclude),
        }));
    }

    Ok(multi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &Path) -> CollectConfig {
        CollectConfig {
            root: root.to_path_buf(),
            include_globs: vec!["**/*.json".to_string()],
            exclude_globs: Vec::new(),
            max_title_chars: 300,
            max_content_chars: 3000,
        }
    }

    #[tokio::test]
    async fn test_collects_per_source_and_skips_bad_files() {
        let tmp = TempDir::new().unwrap();
        let news = tmp.path().join("news");
        let pins = tmp.path().join("pinterest");
        fs::create_dir_all(&news).unwrap();
        fs::create_dir_all(&pins).unwrap();
        fs::create_dir_all(tmp.path().join("misc")).unwrap();

        fs::write(
            news.join("a.json"),
            r#"[{"url":"https://n.test/1","title":"One","published_at":"2024-01-02"},
                {"link":"https://n.test/2","description":"Two"}]"#,
        )
        .unwrap();
        fs::write(news.join("broken.json"), "{not json").unwrap();
        fs::write(news.join("notes.txt"), "ignored").unwrap();
        fs::write(pins.join("b.json"), r#"[{"title":"Pin","language":"unknown"}]"#).unwrap();

        let multi = discover(&config(tmp.path())).unwrap();
        assert_eq!(multi.len(), 2);

        let items = multi.collect("run-1").await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].source, Source::News);
        assert_eq!(items[0].url.as_deref(), Some("https://n.test/1"));
        assert!(items[0].published_at.is_some());
        assert_eq!(items[1].summary, "Two");
        assert_eq!(items[2].source, Source::Social);
        assert_eq!(items[2].language, None);
    }

    #[tokio::test]
    async fn test_trend_directory_and_empty_entries_not_collected() {
        let tmp = TempDir::new().unwrap();
        let trends = tmp.path().join("google_trends");
        let news = tmp.path().join("news");
        fs::create_dir_all(&trends).unwrap();
        fs::create_dir_all(&news).unwrap();
        fs::write(
            trends.join("s.json"),
            r#"[{"keyword":"pastel ui","date":"2024-01-01","value":100},
                {"keyword":"pastel ui","date":"2024-01-02","value":130}]"#,
        )
        .unwrap();
        fs::write(
            news.join("a.json"),
            r#"[{"title":"Kept"}, {}, {"url":"  ","title":""}, {"url":"https://n.test/x"}]"#,
        )
        .unwrap();

        let multi = discover(&config(tmp.path())).unwrap();
        assert_eq!(multi.len(), 1);

        let items = trendline_core::dedup::dedupe(multi.collect("r").await.unwrap());
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.source == Source::News));
        assert_eq!(items[0].title, "Kept");
        assert_eq!(items[1].url.as_deref(), Some("https://n.test/x"));
    }

    #[tokio::test]
    async fn test_exclude_globs() {
        let tmp = TempDir::new().unwrap();
        let news = tmp.path().join("news");
        fs::create_dir_all(&news).unwrap();
        fs::write(news.join("keep.json"), r#"[{"title":"k"}]"#).unwrap();
        fs::write(news.join("skip.json"), r#"[{"title":"s"}]"#).unwrap();

        let mut cfg = config(tmp.path());
        cfg.exclude_globs = vec!["**/skip.json".to_string()];
        let items = discover(&cfg).unwrap().collect("r").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "k");
    }

    #[test]
    fn test_missing_root() {
        let err = discover(&config(Path::new("/definitely/not/here"))).err().unwrap();
        assert!(matches!(err, CollectionError::MissingRoot(_)));
    }

    struct Failing;

    #[async_trait]
    impl Collector for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn collect(&self, _run_id: &str) -> Result<Vec<Item>, CollectionError> {
            Err(CollectionError::MissingRoot(PathBuf::from("/gone")))
        }
    }

    struct Fixed(usize);

    #[async_trait]
    impl Collector for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn collect(&self, _run_id: &str) -> Result<Vec<Item>, CollectionError> {
            Ok((0..self.0)
                .map(|_| Item::new(Source::News, Utc::now()))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_one_failing_source_does_not_abort_others() {
        let multi = MultiCollector::new(vec![Arc::new(Failing), Arc::new(Fixed(2))]);
        assert_eq!(multi.collect("r").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_all_sources_failing() {
        let multi = MultiCollector::new(vec![Arc::new(Failing), Arc::new(Failing)]);
        let err = multi.collect("r").await.unwrap_err();
        assert!(matches!(
            err,
            CollectionError::AllSourcesFailed { attempted: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_multi_collects_nothing() {
        let multi = MultiCollector::default();
        assert!(multi.collect("r").await.unwrap().is_empty());
    }
}
