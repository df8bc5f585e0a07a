//! `trendline quality`: score a precomputed cluster assignment.
//!
//! Input is a JSON file of the form
//! `{"vectors": [[f32, ...], ...], "labels": [i64, ...]}`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use trendline_core::cluster::{ClusterAssignment, ClusterQuality, CosineQuality};

#[derive(Debug, Deserialize)]
struct QualityInput {
    vectors: Vec<Vec<f32>>,
    labels: ClusterAssignment,
}

/// Score the assignment in `input` and print the result as JSON.
///
/// With `breakdown`, the per-cluster-pair separation is included.
pub fn run_quality(input: &Path, breakdown: bool) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read quality input: {}", input.display()))?;
    let parsed: QualityInput = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse quality input: {}", input.display()))?;

    let json = if breakdown {
        let report = CosineQuality
            .quality_report(&parsed.vectors, &parsed.labels)
            .context("invalid quality input")?;
        serde_json::to_string_pretty(&report)?
    } else {
        let stats = CosineQuality
            .similarity_stats(&parsed.vectors, &parsed.labels)
            .context("invalid quality input")?;
        serde_json::to_string_pretty(&stats)?
    };

    println!("{}", json);
    Ok(())
}
