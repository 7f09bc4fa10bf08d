//! Job registry abstraction and its in-memory implementation.

use super::models::{Job, JobProgress};
use crate::core::error::{AppError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Registry of jobs keyed by id.
///
/// `get` and `list` return cloned snapshots. `read` and `update` run a closure
/// under the store's own lock, so a reader never observes a half-written
/// field and never has to copy a job's results to look at them.
pub trait JobStore: Send + Sync {
    fn create(&self, job: Job) -> Result<()>;
    fn get(&self, job_id: &str) -> Option<Job>;
    fn read(&self, job_id: &str, inspect: &mut dyn FnMut(&Job)) -> Result<()>;
    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut Job)) -> Result<()>;
    fn list(&self) -> Vec<Job>;
    fn remove(&self, job_id: &str) -> Option<Job>;

    /// Ids of jobs that reached a terminal state before `cutoff`.
    fn finished_before(&self, cutoff: DateTime<Utc>) -> Vec<String>;

    /// Progress view of one job, without its results.
    fn snapshot(&self, job_id: &str) -> Option<JobProgress> {
        let mut progress = None;
        self.read(job_id, &mut |job| progress = Some(job.snapshot()))
            .ok()?;
        progress
    }
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write();
        if jobs.contains_key(&job.id) {
            return Err(AppError::Task(format!("Job id {} already exists", job.id)));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().get(job_id).cloned()
    }

    fn read(&self, job_id: &str, inspect: &mut dyn FnMut(&Job)) -> Result<()> {
        let jobs = self.jobs.read();
        let job = jobs
            .get(job_id)
            .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;
        inspect(job);
        Ok(())
    }

    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut Job)) -> Result<()> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;
        apply(job);
        Ok(())
    }

    fn list(&self) -> Vec<Job> {
        self.jobs.read().values().cloned().collect()
    }

    fn remove(&self, job_id: &str) -> Option<Job> {
        self.jobs.write().remove(job_id)
    }

    fn finished_before(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.jobs
            .read()
            .values()
            .filter(|job| job.finished_at.is_some_and(|at| at < cutoff))
            .map(|job| job.id.clone())
            .collect()
    }
}
