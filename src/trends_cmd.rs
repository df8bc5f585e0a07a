//! `trendline trends`: offline trend aggregation over raw sample files.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use trendline_core::trend::{analyze, TrendAnalysis};

use crate::trend_feed::{write_outputs, JsonTrendFeed};

/// Aggregate the samples at `input` and write the report files to `out`.
pub fn run_trends(input: &Path, out: &Path) -> Result<TrendAnalysis> {
    let samples = JsonTrendFeed::new(input).load()?;
    let analysis = analyze(&samples).context("invalid trend samples")?;
    let (summary, index) = write_outputs(out, &analysis)?;

    info!(
        samples = samples.len(),
        records = analysis.records.len(),
        "trend analysis written"
    );

    println!(
        "{} samples → {} records across {} keywords",
        samples.len(),
        analysis.records.len(),
        analysis.index.len()
    );
    for (label, count) in analysis.label_counts() {
        println!("  {:<8} {}", label, count);
    }
    println!();
    for keyword in analysis.index.keywords() {
        if let Some(latest) = analysis.index.latest(keyword) {
            let delta = latest
                .delta
                .map(|d| format!("{:+.1}%", d * 100.0))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<24} {}  {:<8} {:>8}",
                keyword,
                latest.date,
                latest.label.as_str(),
                delta
            );
        }
    }
    println!();
    println!("Wrote {}", summary.display());
    println!("Wrote {}", index.display());

    Ok(analysis)
}
