//! Pipeline stages and the daily stage sequence.
//!
//! A [`Stage`] takes the previous stage's [`Payload`] by value and returns
//! the next one. Nothing is shared between stages except what travels in
//! the payload and the write-once artifact store.
//!
//! ```text
//! Start ─collect─▶ Items ─dedup─▶ Items ─preprocess─▶ Items
//!       ─embed─▶ Embedded ─cluster-quality─▶ Clustered ─analyze─▶ Analyzed
//! ```
//!
//! The `trends` stage passes its input through unchanged.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use trendline_core::clean::{clean_item, truncate_chars};
use trendline_core::cluster::{ClusterAssignment, ClusterQuality, CosineQuality};
use trendline_core::dedup::dedupe_with_report;
use trendline_core::embedding::{blob_to_vec, vec_to_blob};
use trendline_core::identity::embedding_key;
use trendline_core::models::Item;
use trendline_core::store::{
    cluster_quality_artifact_key, embedding_artifact_key, topics_artifact_key,
    trends_artifact_key, ArtifactStore,
};
use trendline_core::trend::analyze;

use crate::traits::{Clusterer, Collector, Embedder, LanguageDetector, TopicAnalyzer, TrendFeed};
use crate::trend_feed::write_outputs;

/// Data handed from one stage to the next.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Start,
    Items(Vec<Item>),
    Embedded {
        items: Vec<Item>,
        vectors: Vec<Vec<f32>>,
    },
    Clustered {
        items: Vec<Item>,
        vectors: Vec<Vec<f32>>,
        assignment: ClusterAssignment,
    },
    Analyzed {
        items: Vec<Item>,
        topics: Value,
    },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Start => "start",
            Payload::Items(_) => "items",
            Payload::Embedded { .. } => "embedded",
            Payload::Clustered { .. } => "clustered",
            Payload::Analyzed { .. } => "analyzed",
        }
    }

    pub fn items(&self) -> &[Item] {
        match self {
            Payload::Start => &[],
            Payload::Items(items)
            | Payload::Embedded { items, .. }
            | Payload::Clustered { items, .. }
            | Payload::Analyzed { items, .. } => items,
        }
    }

    pub fn into_items(self) -> Vec<Item> {
        match self {
            Payload::Start => Vec::new(),
            Payload::Items(items)
            | Payload::Embedded { items, .. }
            | Payload::Clustered { items, .. }
            | Payload::Analyzed { items, .. } => items,
        }
    }
}

/// One ordered unit of work within a run.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name recorded as `failed_stage` when this stage errors.
    fn name(&self) -> &str;

    async fn run(&self, run_id: &str, input: Payload) -> Result<Payload>;
}

fn unexpected(stage: &str, payload: &Payload) -> anyhow::Error {
    anyhow!("stage '{}' cannot accept a {} payload", stage, payload.kind())
}

/// Runs the collector.
pub struct CollectStage {
    collector: Arc<dyn Collector>,
}

impl CollectStage {
    pub fn new(collector: Arc<dyn Collector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Stage for CollectStage {
    fn name(&self) -> &str {
        "collect"
    }

    async fn run(&self, run_id: &str, input: Payload) -> Result<Payload> {
        if !matches!(input, Payload::Start) {
            return Err(unexpected(self.name(), &input));
        }
        let items = self.collector.collect(run_id).await?;
        info!(run_id, collector = self.collector.name(), items = items.len(), "collection finished");
        Ok(Payload::Items(items))
    }
}

/// Drops duplicate items by URL and by content hash.
#[derive(Debug, Default)]
pub struct DedupStage;

#[async_trait]
impl Stage for DedupStage {
    fn name(&self) -> &str {
        "dedup"
    }

    async fn run(&self, run_id: &str, input: Payload) -> Result<Payload> {
        let Payload::Items(items) = input else {
            return Err(unexpected(self.name(), &input));
        };
        let report = dedupe_with_report(items);
        info!(
            run_id,
            kept = report.unique.len(),
            dropped_by_url = report.dropped_by_url,
            dropped_by_text = report.dropped_by_text,
            "deduplicated"
        );
        Ok(Payload::Items(report.unique))
    }
}

/// Tags languages, cleans text and truncates long fields.
pub struct PreprocessStage {
    detector: Option<Arc<dyn LanguageDetector>>,
    max_title_chars: usize,
    max_content_chars: usize,
}

impl PreprocessStage {
    pub fn new(
        detector: Option<Arc<dyn LanguageDetector>>,
        max_title_chars: usize,
        max_content_chars: usize,
    ) -> Self {
        Self {
            detector,
            max_title_chars,
            max_content_chars,
        }
    }

    fn detect(&self, item: &Item) -> Option<String> {
        let detector = self.detector.as_ref()?;
        let text = item.joined_text();
        if text.is_empty() {
            return None;
        }
        match detector.detect(&text) {
            Ok(code) => code,
            Err(e) => {
                debug!(error = %e, "language detection failed");
                None
            }
        }
    }

    fn prepare(&self, mut item: Item) -> Item {
        if item.language.is_none() {
            item.language = self.detect(&item);
        }
        let mut item = clean_item(item);
        item.title = truncate_chars(&item.title, self.max_title_chars);
        item.content = truncate_chars(&item.content, self.max_content_chars);
        item
    }
}

#[async_trait]
impl Stage for PreprocessStage {
    fn name(&self) -> &str {
        "preprocess"
    }

    async fn run(&self, run_id: &str, input: Payload) -> Result<Payload> {
        let Payload::Items(items) = input else {
            return Err(unexpected(self.name(), &input));
        };
        let items: Vec<Item> = items.into_iter().map(|i| self.prepare(i)).collect();
        let tagged = items.iter().filter(|i| i.language.is_some()).count();
        info!(run_id, items = items.len(), tagged, "preprocessed");
        Ok(Payload::Items(items))
    }
}

/// Embeds item text, reusing cached vectors.
///
/// Items with no text are not embedded and leave the payload here.
pub struct EmbedStage {
    embedder: Arc<dyn Embedder>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl EmbedStage {
    pub fn new(embedder: Arc<dyn Embedder>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            embedder,
            artifacts,
        }
    }

    async fn cached(&self, key: &str) -> Result<Option<Vec<f32>>> {
        let Some(blob) = self.artifacts.get_artifact(key).await? else {
            return Ok(None);
        };
        let vector = blob_to_vec(&blob);
        if vector.len() != self.embedder.dims() {
            warn!(key, found = vector.len(), expected = self.embedder.dims(), "ignoring cached vector with wrong dims");
            return Ok(None);
        }
        Ok(Some(vector))
    }
}

#[async_trait]
impl Stage for EmbedStage {
    fn name(&self) -> &str {
        "embed"
    }

    async fn run(&self, run_id: &str, input: Payload) -> Result<Payload> {
        let Payload::Items(items) = input else {
            return Err(unexpected(self.name(), &input));
        };

        let before = items.len();
        let items: Vec<Item> = items
            .into_iter()
            .filter(|i| !i.joined_text().is_empty())
            .collect();
        if items.len() < before {
            info!(run_id, skipped = before - items.len(), "items without text not embedded");
        }

        let model = self.embedder.model_name().to_string();
        let texts: Vec<String> = items.iter().map(|i| i.joined_text()).collect();
        let keys: Vec<String> = texts
            .iter()
            .map(|t| embedding_artifact_key(&embedding_key(t, &model)))
            .collect();

        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(items.len());
        for key in &keys {
            vectors.push(self.cached(key).await?);
        }

        let misses: Vec<usize> = (0..vectors.len()).filter(|&i| vectors[i].is_none()).collect();
        info!(run_id, hits = vectors.len() - misses.len(), misses = misses.len(), model = %model, "embedding cache");

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.embedder.embed(&miss_texts).await?;
            if fresh.len() != misses.len() {
                bail!(
                    "embedder returned {} vectors for {} texts",
                    fresh.len(),
                    misses.len()
                );
            }
            for (&i, vector) in misses.iter().zip(fresh) {
                if vector.len() != self.embedder.dims() {
                    bail!(
                        "embedder returned a {}-dim vector, expected {}",
                        vector.len(),
                        self.embedder.dims()
                    );
                }
                self.artifacts
                    .put_artifact(&keys[i], &vec_to_blob(&vector))
                    .await?;
                vectors[i] = Some(vector);
            }
        }

        let vectors = vectors
            .into_iter()
            .map(|v| v.ok_or_else(|| anyhow!("missing embedding")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Payload::Embedded { items, vectors })
    }
}

/// Obtains a partition from the clusterer and records its quality.
///
/// The numbers are advisory: they are logged and stored, never used to
/// reject the partition.
pub struct QualityStage {
    clusterer: Arc<dyn Clusterer>,
    quality: Box<dyn ClusterQuality + Send + Sync>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl QualityStage {
    pub fn new(clusterer: Arc<dyn Clusterer>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            clusterer,
            quality: Box::new(CosineQuality),
            artifacts,
        }
    }
}

#[async_trait]
impl Stage for QualityStage {
    fn name(&self) -> &str {
        "cluster-quality"
    }

    async fn run(&self, run_id: &str, input: Payload) -> Result<Payload> {
        let Payload::Embedded { items, vectors } = input else {
            return Err(unexpected(self.name(), &input));
        };

        let assignment = self.clusterer.cluster(&vectors).await?;
        let report = self.quality.quality_report(&vectors, &assignment)?;

        let cohesion = &report.stats.per_cluster_cohesion;
        let mean_cohesion = if cohesion.is_empty() {
            0.0
        } else {
            cohesion.values().sum::<f64>() / cohesion.len() as f64
        };
        info!(
            run_id,
            clusters = cohesion.len(),
            mean_cohesion,
            separation = report.stats.mean_inter_cluster_similarity,
            "cluster quality"
        );

        self.artifacts
            .put_artifact(
                &cluster_quality_artifact_key(run_id),
                &serde_json::to_vec(&report)?,
            )
            .await?;

        Ok(Payload::Clustered {
            items,
            vectors,
            assignment,
        })
    }
}

/// Hands the brief and the surviving items to the topic analyzer and
/// stores its result.
pub struct AnalyzeStage {
    analyzer: Arc<dyn TopicAnalyzer>,
    brief: String,
    artifacts: Arc<dyn ArtifactStore>,
}

impl AnalyzeStage {
    pub fn new(
        analyzer: Arc<dyn TopicAnalyzer>,
        brief: String,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            analyzer,
            brief,
            artifacts,
        }
    }
}

#[async_trait]
impl Stage for AnalyzeStage {
    fn name(&self) -> &str {
        "analyze"
    }

    async fn run(&self, run_id: &str, input: Payload) -> Result<Payload> {
        if matches!(input, Payload::Start | Payload::Analyzed { .. }) {
            return Err(unexpected(self.name(), &input));
        }
        let items = input.into_items();
        let topics = self.analyzer.analyze(&self.brief, &items).await?;
        self.artifacts
            .put_artifact(&topics_artifact_key(run_id), &serde_json::to_vec(&topics)?)
            .await?;
        info!(run_id, references = items.len(), "topics stored");
        Ok(Payload::Analyzed { items, topics })
    }
}

/// Aggregates the trend feed for the run date. Passes its input through.
pub struct TrendStage {
    feed: Arc<dyn TrendFeed>,
    artifacts: Arc<dyn ArtifactStore>,
    run_date: NaiveDate,
    output_dir: Option<PathBuf>,
}

impl TrendStage {
    pub fn new(
        feed: Arc<dyn TrendFeed>,
        artifacts: Arc<dyn ArtifactStore>,
        run_date: NaiveDate,
        output_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            feed,
            artifacts,
            run_date,
            output_dir,
        }
    }
}

#[async_trait]
impl Stage for TrendStage {
    fn name(&self) -> &str {
        "trends"
    }

    async fn run(&self, run_id: &str, input: Payload) -> Result<Payload> {
        let samples = self.feed.samples().await?;
        let analysis = analyze(&samples)?;

        let key = trends_artifact_key(self.run_date);
        let written = self
            .artifacts
            .put_artifact(&key, &serde_json::to_vec(&analysis)?)
            .await?;
        if !written {
            debug!(run_id, key = %key, "trend analysis already recorded for this date");
        }

        if let Some(dir) = &self.output_dir {
            write_outputs(dir, &analysis)?;
        }

        info!(
            run_id,
            samples = samples.len(),
            records = analysis.records.len(),
            keywords = analysis.index.len(),
            "trends aggregated"
        );
        Ok(input)
    }
}

/// Assembles the daily stage sequence from whichever collaborators are
/// configured.
///
/// `collect`, `dedup` and `preprocess` always run. `embed` needs an
/// embedder, `cluster-quality` needs an embedder and a clusterer,
/// `analyze` needs a topic analyzer, and `trends` needs a trend feed.
pub struct DailyPipeline {
    collector: Arc<dyn Collector>,
    artifacts: Arc<dyn ArtifactStore>,
    detector: Option<Arc<dyn LanguageDetector>>,
    embedder: Option<Arc<dyn Embedder>>,
    clusterer: Option<Arc<dyn Clusterer>>,
    topics: Option<(Arc<dyn TopicAnalyzer>, String)>,
    trend_feed: Option<(Arc<dyn TrendFeed>, Option<PathBuf>)>,
    max_title_chars: usize,
    max_content_chars: usize,
}

impl DailyPipeline {
    pub fn new(collector: Arc<dyn Collector>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            collector,
            artifacts,
            detector: None,
            embedder: None,
            clusterer: None,
            topics: None,
            trend_feed: None,
            max_title_chars: 300,
            max_content_chars: 3000,
        }
    }

    pub fn with_language_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_clusterer(mut self, clusterer: Arc<dyn Clusterer>) -> Self {
        self.clusterer = Some(clusterer);
        self
    }

    pub fn with_topic_analyzer(mut self, analyzer: Arc<dyn TopicAnalyzer>, brief: String) -> Self {
        self.topics = Some((analyzer, brief));
        self
    }

    /// Add the trends stage; when `output_dir` is set the summary and
    /// index files are also written there.
    pub fn with_trend_feed(mut self, feed: Arc<dyn TrendFeed>, output_dir: Option<PathBuf>) -> Self {
        self.trend_feed = Some((feed, output_dir));
        self
    }

    pub fn with_limits(mut self, max_title_chars: usize, max_content_chars: usize) -> Self {
        self.max_title_chars = max_title_chars;
        self.max_content_chars = max_content_chars;
        self
    }

    /// The stage sequence for a run started on `run_date`.
    pub fn stages(&self, run_date: NaiveDate) -> Vec<Box<dyn Stage>> {
        let mut stages: Vec<Box<dyn Stage>> = vec![
            Box::new(CollectStage::new(Arc::clone(&self.collector))),
            Box::new(DedupStage),
            Box::new(PreprocessStage::new(
                self.detector.clone(),
                self.max_title_chars,
                self.max_content_chars,
            )),
        ];

        if let Some(embedder) = &self.embedder {
            stages.push(Box::new(EmbedStage::new(
                Arc::clone(embedder),
                Arc::clone(&self.artifacts),
            )));
            if let Some(clusterer) = &self.clusterer {
                stages.push(Box::new(QualityStage::new(
                    Arc::clone(clusterer),
                    Arc::clone(&self.artifacts),
                )));
            }
        } else if self.clusterer.is_some() {
            warn!("clusterer configured without an embedder; skipping cluster quality");
        }

        if let Some((analyzer, brief)) = &self.topics {
            stages.push(Box::new(AnalyzeStage::new(
                Arc::clone(analyzer),
                brief.clone(),
                Arc::clone(&self.artifacts),
            )));
        }

        if let Some((feed, output_dir)) = &self.trend_feed {
            stages.push(Box::new(TrendStage::new(
                Arc::clone(feed),
                Arc::clone(&self.artifacts),
                run_date,
                output_dir.clone(),
            )));
        }

        stages
    }
}
