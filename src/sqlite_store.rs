//! SQLite-backed [`RunStore`] and [`ArtifactStore`] implementation.
//!
//! Maps each storage operation to a single statement against the
//! `pipeline_runs` and `artifacts` tables created by
//! [`run_migrations`](crate::migrate::run_migrations).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use trendline_core::models::{PipelineRun, RunCompletion, RunStatus};
use trendline_core::store::{ArtifactStore, RunStore};

/// SQLite implementation of the storage traits.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Fixed-width microsecond RFC 3339, so text order is time order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp in pipeline_runs: '{}'", raw))
}

fn row_to_run(row: &SqliteRow) -> Result<PipelineRun> {
    let status: String = row.get("status");
    let run_date: String = row.get("run_date");
    let started_at: String = row.get("started_at");
    let finished_at: Option<String> = row.get("finished_at");

    Ok(PipelineRun {
        run_id: row.get("run_id"),
        run_date: NaiveDate::parse_from_str(&run_date, "%Y-%m-%d")
            .with_context(|| format!("invalid run_date in pipeline_runs: '{}'", run_date))?,
        version: row.get("version"),
        status: RunStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown run status in pipeline_runs: '{}'", status))?,
        started_at: parse_ts(&started_at)?,
        finished_at: finished_at.as_deref().map(parse_ts).transpose()?,
        error_message: row.get("error_message"),
        error_trace: row.get("error_trace"),
        failed_stage: row.get("failed_stage"),
    })
}

#[async_trait]
impl RunStore for SqliteStore {
    async fn insert_run(&self, run: &PipelineRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_runs (run_id, run_date, version, status, started_at,
                                       finished_at, error_message, error_trace, failed_stage)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.run_id)
        .bind(run.run_date.format("%Y-%m-%d").to_string())
        .bind(&run.version)
        .bind(run.status.as_str())
        .bind(format_ts(run.started_at))
        .bind(run.finished_at.map(format_ts))
        .bind(&run.error_message)
        .bind(&run.error_trace)
        .bind(&run.failed_stage)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert run {}", run.run_id))?;

        Ok(())
    }

    async fn finish_run(&self, run_id: &str, completion: &RunCompletion) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET status = ?, finished_at = ?, error_message = ?, error_trace = ?, failed_stage = ?
            WHERE run_id = ? AND status = 'running'
            "#,
        )
        .bind(completion.status.as_str())
        .bind(format_ts(completion.finished_at))
        .bind(&completion.error_message)
        .bind(&completion.error_trace)
        .bind(&completion.failed_stage)
        .bind(run_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to finish run {}", run_id))?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<PipelineRun>> {
        let row = sqlx::query("SELECT * FROM pipeline_runs WHERE run_id = ?")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_run).transpose()
    }

    async fn list_runs(&self, limit: i64) -> Result<Vec<PipelineRun>> {
        let rows = sqlx::query(
            "SELECT * FROM pipeline_runs ORDER BY started_at DESC, run_id ASC LIMIT ?",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_run).collect()
    }
}

#[async_trait]
impl ArtifactStore for SqliteStore {
    async fn put_artifact(&self, key: &str, body: &[u8]) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO artifacts (key, body, created_at) VALUES (?, ?, ?) ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .bind(body)
        .bind(format_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to store artifact {}", key))?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_artifact(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let body: Option<Vec<u8>> = sqlx::query_scalar("SELECT body FROM artifacts WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(body)
    }
}
