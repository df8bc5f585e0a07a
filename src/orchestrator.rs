//! Run lifecycle orchestration.
//!
//! A run moves `running → success | failed` exactly once:
//!
//! - [`begin_run`](Orchestrator::begin_run) persists a fresh `running`
//!   record (one write).
//! - [`execute_stages`](Orchestrator::execute_stages) invokes stages
//!   strictly in order; the first error aborts the rest.
//! - [`complete`](Orchestrator::complete) or [`fail`](Orchestrator::fail)
//!   applies the terminal transition (one write). The store only updates a
//!   record that is still `running`, so a second transition surfaces as
//!   [`PipelineError::InvalidTransition`].
//!
//! A failed run is never resumed. Retrying means a new run id.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use trendline_core::models::{PipelineRun, RunCompletion, RunStatus};
use trendline_core::store::RunStore;

use crate::error::{error_message, error_trace, PipelineError};
use crate::stages::{Payload, Stage};

/// Timing and output size of one executed stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub output_kind: &'static str,
    pub output_items: usize,
}

/// Result of [`Orchestrator::execute_stages`].
#[derive(Debug)]
pub struct Execution {
    pub payload: Payload,
    pub stages: Vec<StageReport>,
}

/// Result of a successful [`Orchestrator::run`].
#[derive(Debug)]
pub struct RunReport {
    pub run: PipelineRun,
    pub execution: Execution,
}

pub struct Orchestrator {
    runs: Arc<dyn RunStore>,
}

impl Orchestrator {
    pub fn new(runs: Arc<dyn RunStore>) -> Self {
        Self { runs }
    }

    /// Allocate a run id and persist a `running` record.
    pub async fn begin_run(&self, version: &str) -> Result<PipelineRun, PipelineError> {
        let run = PipelineRun::start(version, Utc::now());
        self.runs.insert_run(&run).await.map_err(|e| {
            PipelineError::infrastructure(format!("failed to create run {}", run.run_id), e)
        })?;
        info!(run_id = %run.run_id, version, run_date = %run.run_date, "run started");
        Ok(run)
    }

    /// Run `stages` in order, threading the payload from `input`.
    ///
    /// Stops at the first failing stage and returns
    /// [`PipelineError::Stage`] naming it; later stages are not invoked.
    pub async fn execute_stages(
        &self,
        run_id: &str,
        stages: &[Box<dyn Stage>],
        input: Payload,
    ) -> Result<Execution, PipelineError> {
        let mut payload = input;
        let mut reports = Vec::with_capacity(stages.len());

        for stage in stages {
            let name = stage.name().to_string();
            info!(run_id, stage = %name, "stage started");
            let started = Instant::now();

            payload = stage
                .run(run_id, payload)
                .await
                .map_err(|source| PipelineError::Stage {
                    stage: name.clone(),
                    source,
                })?;

            let elapsed_ms = started.elapsed().as_millis();
            info!(run_id, stage = %name, elapsed_ms, items = payload.items().len(), "stage finished");
            reports.push(StageReport {
                name,
                elapsed_ms,
                output_kind: payload.kind(),
                output_items: payload.items().len(),
            });
        }

        Ok(Execution {
            payload,
            stages: reports,
        })
    }

    /// Mark the run `success`.
    pub async fn complete(&self, run_id: &str) -> Result<(), PipelineError> {
        let applied = self
            .runs
            .finish_run(run_id, &RunCompletion::success(Utc::now()))
            .await
            .map_err(|e| {
                PipelineError::infrastructure(format!("failed to complete run {}", run_id), e)
            })?;
        if !applied {
            return Err(PipelineError::InvalidTransition {
                run_id: run_id.to_string(),
            });
        }
        info!(run_id, status = %RunStatus::Success, "run finished");
        Ok(())
    }

    /// Mark the run `failed`, recording `error`, and hand `error` back.
    ///
    /// The returned error is always the one passed in. A failure to record
    /// it is logged, never substituted.
    pub async fn fail(&self, run_id: &str, error: PipelineError) -> PipelineError {
        let message = error_message(&error);
        let completion = RunCompletion::failure(
            Utc::now(),
            message.clone(),
            error_trace(&error),
            error.stage().map(str::to_string),
        );

        match self.runs.finish_run(run_id, &completion).await {
            Ok(true) => {
                error!(run_id, stage = error.stage().unwrap_or("-"), error = %message, "run failed");
            }
            Ok(false) => {
                warn!(run_id, error = %message, "run already terminal; failure not recorded");
            }
            Err(record_err) => {
                error!(
                    run_id,
                    error = %message,
                    record_error = %format!("{:#}", record_err),
                    "run failed and the failure could not be recorded"
                );
            }
        }

        error
    }

    /// Begin a run, execute the stages `build` returns for it, and apply
    /// the terminal transition.
    pub async fn run<F>(&self, version: &str, build: F) -> Result<RunReport, PipelineError>
    where
        F: FnOnce(&PipelineRun) -> Vec<Box<dyn Stage>>,
    {
        let mut run = self.begin_run(version).await?;
        let stages = build(&run);

        let execution = match self
            .execute_stages(&run.run_id, &stages, Payload::Start)
            .await
        {
            Ok(execution) => execution,
            Err(e) => return Err(self.fail(&run.run_id, e).await),
        };

        self.complete(&run.run_id).await?;
        run.status = RunStatus::Success;
        Ok(RunReport { run, execution })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use trendline_core::store::memory::InMemoryStore;

    struct Noop;

    #[async_trait]
    impl Stage for Noop {
        fn name(&self) -> &str {
            "noop"
        }
        async fn run(&self, _run_id: &str, input: Payload) -> Result<Payload> {
            Ok(input)
        }
    }

    struct Broken;

    #[async_trait]
    impl Stage for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        async fn run(&self, _run_id: &str, _input: Payload) -> Result<Payload> {
            bail!("kaput")
        }
    }

    #[tokio::test]
    async fn test_begin_run_writes_running_record() {
        let store = Arc::new(InMemoryStore::new());
        let orch = Orchestrator::new(store.clone());
        let run = orch.begin_run("v1.0.0").await.unwrap();

        let stored = store.get_run(&run.run_id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Running);
        assert_eq!(stored.version, "v1.0.0");
        assert_eq!(store.run_writes(), 1);
    }

    #[tokio::test]
    async fn test_execute_stages_reports_each_stage() {
        let orch = Orchestrator::new(Arc::new(InMemoryStore::new()));
        let stages: Vec<Box<dyn Stage>> = vec![Box::new(Noop), Box::new(Noop)];
        let execution = orch
            .execute_stages("r", &stages, Payload::Items(Vec::new()))
            .await
            .unwrap();
        assert_eq!(execution.stages.len(), 2);
        assert_eq!(execution.stages[1].output_kind, "items");
    }

    #[tokio::test]
    async fn test_fail_records_stage_and_trace() {
        let store = Arc::new(InMemoryStore::new());
        let orch = Orchestrator::new(store.clone());
        let run = orch.begin_run("v1").await.unwrap();

        let stages: Vec<Box<dyn Stage>> = vec![Box::new(Broken)];
        let err = orch
            .execute_stages(&run.run_id, &stages, Payload::Start)
            .await
            .unwrap_err();
        let err = orch.fail(&run.run_id, err).await;
        assert_eq!(err.stage(), Some("broken"));

        let stored = store.get_run(&run.run_id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.failed_stage.as_deref(), Some("broken"));
        assert_eq!(
            stored.error_message.as_deref(),
            Some("stage 'broken' failed: kaput")
        );
        assert_eq!(
            stored.error_trace.as_deref(),
            Some("0: stage 'broken' failed\n1: kaput")
        );
        assert!(stored.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_complete_twice_is_invalid() {
        let store = Arc::new(InMemoryStore::new());
        let orch = Orchestrator::new(store.clone());
        let run = orch.begin_run("v1").await.unwrap();

        orch.complete(&run.run_id).await.unwrap();
        let err = orch.complete(&run.run_id).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));

        let stored = store.get_run(&run.run_id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Success);
    }
}
