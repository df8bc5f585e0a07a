//! Capabilities the daily pipeline is assembled from.
//!
//! Collection, embedding, clustering, topic analysis and language
//! detection are external concerns. Each is a trait here so the pipeline
//! can be wired to real backends in production and to in-process fakes in
//! tests.
//!
//! # Architecture
//!
//! ```text
//! Collector ──▶ dedup ──▶ preprocess ──▶ Embedder ──▶ Clusterer ──▶ TopicAnalyzer
//!                           │ LanguageDetector          │ quality (advisory)
//! TrendFeed ──▶ trend aggregation (any time a raw series exists)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use async_trait::async_trait;
//! use trendline::error::CollectionError;
//! use trendline::traits::Collector;
//! use trendline_core::models::Item;
//!
//! pub struct StaticCollector(Vec<Item>);
//!
//! #[async_trait]
//! impl Collector for StaticCollector {
//!     fn name(&self) -> &str { "static" }
//!
//!     async fn collect(&self, _run_id: &str) -> Result<Vec<Item>, CollectionError> {
//!         Ok(self.0.clone())
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use trendline_core::cluster::ClusterAssignment;
use trendline_core::embedding::EmbeddingProvider;
use trendline_core::models::{Item, TrendSample};

use crate::error::CollectionError;

/// Produces the raw items for a run.
///
/// Per-source fault tolerance is the collector's decision; see
/// [`MultiCollector`](crate::collector_fs::MultiCollector).
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short label used in logs (e.g. `"filesystem"`).
    fn name(&self) -> &str;

    async fn collect(&self, run_id: &str) -> Result<Vec<Item>, CollectionError>;
}

/// Turns texts into fixed-dimension vectors.
///
/// Must be deterministic for a given [`model_name`](EmbeddingProvider::model_name),
/// which is part of the embedding cache key.
#[async_trait]
pub trait Embedder: EmbeddingProvider {
    /// Embed `texts`, returning one vector per text in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Partitions a vector set. The pipeline only scores the result.
#[async_trait]
pub trait Clusterer: Send + Sync {
    async fn cluster(&self, vectors: &[Vec<f32>]) -> Result<ClusterAssignment>;
}

/// Extracts topics for a brief from reference items.
///
/// The returned JSON is stored as an opaque artifact.
#[async_trait]
pub trait TopicAnalyzer: Send + Sync {
    async fn analyze(&self, brief: &str, references: &[Item]) -> Result<Value>;
}

/// Guesses a language code for a text.
///
/// `Ok(None)` means undetermined. Errors are treated the same way by the
/// preprocess stage.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<Option<String>>;
}

/// Source of raw trend samples.
#[async_trait]
pub trait TrendFeed: Send + Sync {
    async fn samples(&self) -> Result<Vec<TrendSample>>;
}
