//! In-memory [`RunStore`] and [`ArtifactStore`] implementation for testing.
//!
//! Uses `HashMap` behind `std::sync::RwLock` for thread safety and counts
//! run-record writes so tests can assert the one-write-per-transition
//! contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{PipelineRun, RunCompletion, RunStatus};

use super::{ArtifactStore, RunStore};

/// In-memory store for tests and embedding.
pub struct InMemoryStore {
    runs: RwLock<HashMap<String, PipelineRun>>,
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
    run_writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            artifacts: RwLock::new(HashMap::new()),
            run_writes: AtomicUsize::new(0),
        }
    }

    /// Number of run-record writes issued so far, including ones that
    /// changed nothing.
    pub fn run_writes(&self) -> usize {
        self.run_writes.load(Ordering::SeqCst)
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.read().map(|a| a.len()).unwrap_or(0)
    }

    fn runs_read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, PipelineRun>>> {
        self.runs.read().map_err(|_| anyhow!("run table lock poisoned"))
    }

    fn runs_write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, PipelineRun>>> {
        self.runs.write().map_err(|_| anyhow!("run table lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStore for InMemoryStore {
    async fn insert_run(&self, run: &PipelineRun) -> Result<()> {
        self.run_writes.fetch_add(1, Ordering::SeqCst);
        let mut runs = self.runs_write()?;
        if runs.contains_key(&run.run_id) {
            bail!("run {} already exists", run.run_id);
        }
        runs.insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    async fn finish_run(&self, run_id: &str, completion: &RunCompletion) -> Result<bool> {
        self.run_writes.fetch_add(1, Ordering::SeqCst);
        let mut runs = self.runs_write()?;
        match runs.get_mut(run_id) {
            Some(run) if run.status == RunStatus::Running => {
                run.apply(completion);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<PipelineRun>> {
        Ok(self.runs_read()?.get(run_id).cloned())
    }

    async fn list_runs(&self, limit: i64) -> Result<Vec<PipelineRun>> {
        let mut runs: Vec<PipelineRun> = self.runs_read()?.values().cloned().collect();
        runs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| a.run_id.cmp(&b.run_id))
        });
        runs.truncate(limit.max(0) as usize);
        Ok(runs)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn put_artifact(&self, key: &str, body: &[u8]) -> Result<bool> {
        let mut artifacts = self
            .artifacts
            .write()
            .map_err(|_| anyhow!("artifact table lock poisoned"))?;
        if artifacts.contains_key(key) {
            return Ok(false);
        }
        artifacts.insert(key.to_string(), body.to_vec());
        Ok(true)
    }

    async fn get_artifact(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let artifacts = self
            .artifacts
            .read()
            .map_err(|_| anyhow!("artifact table lock poisoned"))?;
        Ok(artifacts.get(key).cloned())
    }
}
