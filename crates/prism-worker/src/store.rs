//! In-process job store and the per-job state machine.
//!
//! The store is plain data; the scheduler wraps it in a mutex so every
//! transition, including the active-count check on dispatch, happens under
//! one lock acquisition.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;

use prism_core::error::AppError;
use prism_core::result::AppResult;
use prism_core::types::JobId;
use prism_entity::{JobRecord, JobStats, JobStatus};

/// Error message stored on cancelled jobs.
pub(crate) const CANCELLED: &str = "cancelled";

/// Result of a failed attempt.
#[derive(Debug, Clone)]
pub(crate) enum FailureOutcome {
    /// Back in the queue for another attempt.
    Requeued(JobRecord),
    /// Terminal failure.
    Failed(JobRecord),
}

#[derive(Debug, Default)]
pub(crate) struct JobStore {
    jobs: HashMap<JobId, JobRecord>,
    /// Creation order, for listing.
    order: Vec<JobId>,
    /// Waiting jobs, head dispatched first.
    pending: VecDeque<JobId>,
    active: usize,
    /// Jobs whose next attempt was already charged by a manual retry.
    precharged: HashSet<JobId>,
}

impl JobStore {
    /// Add a waiting job at the tail of the queue.
    pub fn insert(&mut self, job: JobRecord) -> AppResult<JobRecord> {
        if self.jobs.contains_key(&job.id) {
            return Err(AppError::conflict(format!("Job {} already exists", job.id)));
        }
        let id = job.id;
        self.order.push(id);
        self.pending.push_back(id);
        self.jobs.insert(id, job.clone());
        Ok(job)
    }

    /// Pop the head of the queue and mark it active, unless `limit` jobs
    /// are already active.
    pub fn dispatch_next(&mut self, limit: usize) -> Option<JobRecord> {
        if self.active_count() >= limit {
            return None;
        }

        while let Some(id) = self.pending.pop_front() {
            let Some(job) = self.jobs.get_mut(&id) else {
                continue;
            };
            if job.status != JobStatus::Waiting {
                continue;
            }

            if !self.precharged.remove(&id) {
                job.attempts += 1;
            }
            job.status = JobStatus::Active;
            job.started_at = Some(Utc::now());
            self.active += 1;
            return Some(job.clone());
        }

        None
    }

    /// `active -> completed`.
    pub fn complete(&mut self, id: JobId) -> Option<JobRecord> {
        let job = self.active_job_mut(id)?;
        job.status = JobStatus::Completed;
        job.progress = 100;
        job.completed_at = Some(Utc::now());
        job.error = None;
        let done = job.clone();
        self.active -= 1;
        Some(done)
    }

    /// `active -> waiting` when `requeue` is allowed and attempts remain,
    /// `active -> failed` otherwise.
    pub fn fail_attempt(
        &mut self,
        id: JobId,
        requeue: bool,
        error: String,
    ) -> Option<FailureOutcome> {
        let job = self.active_job_mut(id)?;
        let outcome = if requeue && !job.attempts_exhausted() {
            job.status = JobStatus::Waiting;
            job.progress = 0;
            FailureOutcome::Requeued(job.clone())
        } else {
            job.status = JobStatus::Failed;
            job.error = Some(error);
            FailureOutcome::Failed(job.clone())
        };

        self.active -= 1;
        if matches!(outcome, FailureOutcome::Requeued(_)) {
            self.pending.push_back(id);
        }
        Some(outcome)
    }

    /// `waiting -> failed`. No effect on any other status.
    pub fn cancel(&mut self, id: JobId) -> Option<JobRecord> {
        let job = self.jobs.get_mut(&id)?;
        if job.status != JobStatus::Waiting {
            return None;
        }
        job.status = JobStatus::Failed;
        job.error = Some(CANCELLED.to_string());
        let cancelled = job.clone();

        self.pending.retain(|queued| *queued != id);
        self.precharged.remove(&id);
        Some(cancelled)
    }

    /// `failed -> waiting` while attempts remain. Charges one attempt now so
    /// the next dispatch does not charge again.
    pub fn retry(&mut self, id: JobId) -> Option<JobRecord> {
        let job = self.jobs.get_mut(&id)?;
        if !job.can_retry() {
            return None;
        }
        job.status = JobStatus::Waiting;
        job.attempts += 1;
        job.progress = 0;
        job.error = None;
        job.started_at = None;
        let retried = job.clone();

        self.precharged.insert(id);
        self.pending.push_back(id);
        Some(retried)
    }

    /// Overwrite the progress of an active job, clamped to 0..=100.
    pub fn set_progress(&mut self, id: JobId, percent: i64) -> Option<JobRecord> {
        let job = self.active_job_mut(id)?;
        job.progress = percent.clamp(0, 100) as u8;
        Some(job.clone())
    }

    pub fn get(&self, id: JobId) -> Option<&JobRecord> {
        self.jobs.get(&id)
    }

    /// Jobs in creation order, optionally filtered by status.
    pub fn list(&self, status: Option<JobStatus>) -> Vec<JobRecord> {
        self.order
            .iter()
            .filter_map(|id| self.jobs.get(id))
            .filter(|job| status.is_none_or(|s| job.status == s))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> JobStats {
        let mut stats = JobStats::default();
        for job in self.jobs.values() {
            match job.status {
                JobStatus::Waiting => stats.waiting += 1,
                JobStatus::Active => stats.active += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    /// No job is waiting or active.
    pub fn is_idle(&self) -> bool {
        self.active == 0 && self.pending.is_empty()
    }

    fn active_job_mut(&mut self, id: JobId) -> Option<&mut JobRecord> {
        self.jobs
            .get_mut(&id)
            .filter(|job| job.status == JobStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_entity::JobPayload;

    fn job(max_attempts: u32) -> JobRecord {
        let payload = JobPayload {
            pipeline_id: "pl-1".to_string(),
            image_ids: vec!["img-1".to_string(), "img-2".to_string()],
            user_id: "user-1".to_string(),
            metadata: None,
        };
        JobRecord::new(JobId::new(), payload, max_attempts)
    }

    #[test]
    fn test_dispatch_respects_limit_and_order() {
        let mut store = JobStore::default();
        let first = store.insert(job(3)).unwrap();
        let second = store.insert(job(3)).unwrap();
        store.insert(job(3)).unwrap();

        let a = store.dispatch_next(2).unwrap();
        let b = store.dispatch_next(2).unwrap();
        assert_eq!(a.id, first.id);
        assert_eq!(b.id, second.id);
        assert_eq!(a.attempts, 1);
        assert!(store.dispatch_next(2).is_none());
        assert_eq!(store.active_count(), 2);

        store.complete(a.id).unwrap();
        assert!(store.dispatch_next(2).is_some());
    }

    #[test]
    fn test_failure_requeues_until_exhausted() {
        let mut store = JobStore::default();
        let id = store.insert(job(2)).unwrap().id;

        store.dispatch_next(1).unwrap();
        match store.fail_attempt(id, true, "boom".into()).unwrap() {
            FailureOutcome::Requeued(job) => {
                assert_eq!(job.status, JobStatus::Waiting);
                assert_eq!(job.progress, 0);
                assert_eq!(job.attempts, 1);
            }
            other => panic!("expected requeue, got {other:?}"),
        }

        store.dispatch_next(1).unwrap();
        match store.fail_attempt(id, true, "boom".into()).unwrap() {
            FailureOutcome::Failed(job) => {
                assert_eq!(job.attempts, 2);
                assert_eq!(job.error.as_deref(), Some("boom"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(store.is_idle());
    }

    #[test]
    fn test_no_requeue_fails_immediately() {
        let mut store = JobStore::default();
        let id = store.insert(job(3)).unwrap().id;
        store.dispatch_next(1).unwrap();

        let outcome = store.fail_attempt(id, false, "review".into()).unwrap();
        assert!(matches!(outcome, FailureOutcome::Failed(ref j) if j.attempts == 1));
    }

    #[test]
    fn test_cancel_only_from_waiting() {
        let mut store = JobStore::default();
        let running = store.insert(job(3)).unwrap().id;
        let queued = store.insert(job(3)).unwrap().id;
        store.dispatch_next(1).unwrap();

        assert!(store.cancel(running).is_none());
        assert_eq!(store.get(running).unwrap().status, JobStatus::Active);

        let cancelled = store.cancel(queued).unwrap();
        assert_eq!(cancelled.status, JobStatus::Failed);
        assert_eq!(cancelled.error.as_deref(), Some(CANCELLED));
        store.complete(running).unwrap();
        assert!(store.dispatch_next(1).is_none());
    }

    #[test]
    fn test_retry_charges_exactly_one_attempt() {
        let mut store = JobStore::default();
        let id = store.insert(job(3)).unwrap().id;
        store.dispatch_next(1).unwrap();
        store.fail_attempt(id, false, "review".into()).unwrap();

        let retried = store.retry(id).unwrap();
        assert_eq!(retried.attempts, 2);
        assert_eq!(retried.status, JobStatus::Waiting);

        let dispatched = store.dispatch_next(1).unwrap();
        assert_eq!(dispatched.attempts, 2);

        store.fail_attempt(id, true, "again".into()).unwrap();
        let third = store.dispatch_next(1).unwrap();
        assert_eq!(third.attempts, 3);
        let outcome = store.fail_attempt(id, true, "last".into()).unwrap();
        assert!(matches!(outcome, FailureOutcome::Failed(ref j) if j.attempts == 3));
        assert!(store.retry(id).is_none());
    }

    #[test]
    fn test_retry_is_noop_unless_failed() {
        let mut store = JobStore::default();
        let id = store.insert(job(3)).unwrap().id;
        assert!(store.retry(id).is_none());
        store.dispatch_next(1).unwrap();
        assert!(store.retry(id).is_none());
    }

    #[test]
    fn test_progress_is_clamped_and_requires_active() {
        let mut store = JobStore::default();
        let id = store.insert(job(3)).unwrap().id;
        assert!(store.set_progress(id, 40).is_none());

        store.dispatch_next(1).unwrap();
        assert_eq!(store.set_progress(id, 140).unwrap().progress, 100);
        assert_eq!(store.set_progress(id, -3).unwrap().progress, 0);
    }

    #[test]
    fn test_stats_group_by_status() {
        let mut store = JobStore::default();
        let a = store.insert(job(1)).unwrap().id;
        store.insert(job(1)).unwrap();
        store.dispatch_next(1).unwrap();
        store.complete(a).unwrap();

        let stats = store.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.total(), 2);
    }
}
