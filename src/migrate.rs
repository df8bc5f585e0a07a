use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Create run lifecycle table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            run_id TEXT PRIMARY KEY,
            run_date TEXT NOT NULL,
            version TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('running', 'success', 'failed')),
            started_at TEXT NOT NULL,
            finished_at TEXT,
            error_message TEXT,
            error_trace TEXT,
            failed_stage TEXT
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create write-once artifact table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifacts (
            key TEXT PRIMARY KEY,
            body BLOB NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipeline_runs_started_at ON pipeline_runs(started_at DESC)",
    )
    .execute(&pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pipeline_runs_status ON pipeline_runs(status)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
