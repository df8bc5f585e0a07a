//! `trendline run` and `trendline runs`.
//!
//! `run` wires the configured collaborators into a [`DailyPipeline`] and
//! executes it under the [`Orchestrator`]. `runs` lists the recorded run
//! history.

use anyhow::{Context, Result};
use std::sync::Arc;

use trendline_core::store::RunStore;

use crate::collector_fs;
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::language::ScriptDetector;
use crate::orchestrator::Orchestrator;
use crate::sqlite_store::SqliteStore;
use crate::stages::DailyPipeline;
use crate::topics::TermFrequencyAnalyzer;
use crate::trend_feed::JsonTrendFeed;

/// Build the daily pipeline from configuration.
pub fn build_pipeline(config: &Config, store: Arc<SqliteStore>) -> Result<DailyPipeline> {
    let collect = config
        .collect
        .as_ref()
        .context("[collect] section is required to run the pipeline")?;
    let collector = collector_fs::discover(collect)?;

    let mut pipeline = DailyPipeline::new(Arc::new(collector), store)
        .with_language_detector(Arc::new(ScriptDetector))
        .with_limits(collect.max_title_chars, collect.max_content_chars);

    if let Some(embedder) = create_embedder(&config.embedding)? {
        pipeline = pipeline.with_embedder(embedder);
    }

    if let Some(brief) = &config.pipeline.brief {
        pipeline =
            pipeline.with_topic_analyzer(Arc::new(TermFrequencyAnalyzer::default()), brief.clone());
    }

    if let Some(root) = &config.trends.root {
        pipeline = pipeline.with_trend_feed(
            Arc::new(JsonTrendFeed::new(root)),
            Some(config.trends.output_dir.clone()),
        );
    }

    Ok(pipeline)
}

/// Execute one daily run and print its outcome.
pub async fn run_daily(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let pipeline = build_pipeline(config, Arc::clone(&store))?;
    let orchestrator = Orchestrator::new(store.clone());

    let report = orchestrator
        .run(&config.pipeline.version, |run| pipeline.stages(run.run_date))
        .await?;

    println!("run_id:  {}", report.run.run_id);
    println!("status:  {}", report.run.status);
    println!("version: {}", report.run.version);
    println!();
    for stage in &report.execution.stages {
        println!(
            "  {:<16} {:>6} {:<10} {:>6} ms",
            stage.name, stage.output_items, stage.output_kind, stage.elapsed_ms
        );
    }

    store.pool().close().await;
    Ok(())
}

/// Print the most recent runs, newest first.
pub async fn list_runs(config: &Config, limit: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let runs = store.list_runs(limit).await?;

    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:<8}  {:<20}  {}",
        "RUN ID", "DATE", "STATUS", "STARTED", "DETAIL"
    );
    for run in &runs {
        let detail = match (&run.failed_stage, &run.error_message) {
            (Some(stage), Some(msg)) => format!("[{}] {}", stage, msg),
            (None, Some(msg)) => msg.clone(),
            _ => run.version.clone(),
        };
        println!(
            "{:<36}  {:<10}  {:<8}  {:<20}  {}",
            run.run_id,
            run.run_date.to_string(),
            run.status.as_str(),
            run.started_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            detail
        );
    }

    store.pool().close().await;
    Ok(())
}
