//! Trend sample input and trend report output on the filesystem.
//!
//! [`JsonTrendFeed`] reads raw samples from a JSON file or from every
//! `*.json` file under a directory; each file holds an array of
//! `{"keyword", "date", "value"}` objects. [`write_outputs`] writes the
//! analysis as `daily_trend_summary.json` and `trend_index.json`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use trendline_core::models::TrendSample;
use trendline_core::trend::TrendAnalysis;

use crate::traits::TrendFeed;

pub const SUMMARY_FILE: &str = "daily_trend_summary.json";
pub const INDEX_FILE: &str = "trend_index.json";

/// Trend samples stored as JSON on disk.
pub struct JsonTrendFeed {
    path: PathBuf,
}

impl JsonTrendFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read every sample, failing when none are found.
    pub fn load(&self) -> Result<Vec<TrendSample>> {
        if !self.path.exists() {
            bail!("trend input does not exist: {}", self.path.display());
        }

        let samples = if self.path.is_file() {
            read_samples(&self.path)?
        } else {
            let mut samples = Vec::new();
            for entry in WalkDir::new(&self.path).sort_by_file_name() {
                let entry = entry?;
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some("json")
                {
                    continue;
                }
                match read_samples(path) {
                    Ok(batch) => samples.extend(batch),
                    Err(e) => warn!(file = %path.display(), error = %e, "skipping trend file"),
                }
            }
            samples
        };

        if samples.is_empty() {
            bail!("no trend samples found in {}", self.path.display());
        }
        debug!(samples = samples.len(), "loaded trend samples");
        Ok(samples)
    }
}

fn read_samples(path: &Path) -> Result<Vec<TrendSample>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trend file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse trend file: {}", path.display()))
}

#[async_trait]
impl TrendFeed for JsonTrendFeed {
    async fn samples(&self) -> Result<Vec<TrendSample>> {
        self.load()
    }
}

/// Write the summary and index files into `dir`, creating it if needed.
///
/// Returns the two written paths.
pub fn write_outputs(dir: &Path, analysis: &TrendAnalysis) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let summary_path = dir.join(SUMMARY_FILE);
    std::fs::write(&summary_path, serde_json::to_vec_pretty(&analysis.records)?)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;

    let index_path = dir.join(INDEX_FILE);
    std::fs::write(&index_path, serde_json::to_vec_pretty(&analysis.index)?)
        .with_context(|| format!("Failed to write {}", index_path.display()))?;

    Ok((summary_path, index_path))
}
