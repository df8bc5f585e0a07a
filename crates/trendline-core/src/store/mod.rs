//! Storage abstraction for Trendline.
//!
//! Two capabilities back the pipeline:
//!
//! - [`RunStore`] holds [`PipelineRun`] records keyed by `run_id`.
//! - [`ArtifactStore`] is write-once blob storage keyed by a content hash,
//!   run id, or date (see the key helpers below).
//!
//! Implementations must be `Send + Sync` to work with async runtimes. The
//! SQLite backend lives in the `trendline` app crate; [`memory`] provides
//! an in-memory backend for tests and embedding.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::identity::ContentHash;
use crate::models::{PipelineRun, RunCompletion};

/// Persistence for run lifecycle records.
///
/// Every method is a single write or read; implementations must not batch
/// or retry on their own.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_run`](RunStore::insert_run) | Persist a new `running` record |
/// | [`finish_run`](RunStore::finish_run) | Apply a terminal transition |
/// | [`get_run`](RunStore::get_run) | Fetch one record |
/// | [`list_runs`](RunStore::list_runs) | Most recent records first |
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a new run record. Fails if `run_id` already exists.
    async fn insert_run(&self, run: &PipelineRun) -> Result<()>;

    /// Apply `completion` to the run if, and only if, it is still
    /// `running`.
    ///
    /// Returns `false` when no running record with `run_id` exists, which
    /// includes runs that already reached a terminal state.
    async fn finish_run(&self, run_id: &str, completion: &RunCompletion) -> Result<bool>;

    async fn get_run(&self, run_id: &str) -> Result<Option<PipelineRun>>;

    /// Runs ordered by `started_at` descending.
    async fn list_runs(&self, limit: i64) -> Result<Vec<PipelineRun>>;
}

/// Write-once blob storage.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `body` under `key` unless the key already exists.
    ///
    /// Returns `true` if this call wrote the blob.
    async fn put_artifact(&self, key: &str, body: &[u8]) -> Result<bool>;

    async fn get_artifact(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Key of a cached embedding vector.
pub fn embedding_artifact_key(hash: &ContentHash) -> String {
    format!("embedding/{}", hash)
}

/// Key of a run's cluster-quality report.
pub fn cluster_quality_artifact_key(run_id: &str) -> String {
    format!("cluster-quality/{}", run_id)
}

/// Key of a run's topic-analysis result.
pub fn topics_artifact_key(run_id: &str) -> String {
    format!("topics/{}", run_id)
}

/// Key of the trend analysis for a run date.
pub fn trends_artifact_key(date: NaiveDate) -> String {
    format!("trends/{}", date.format("%Y-%m-%d"))
}
