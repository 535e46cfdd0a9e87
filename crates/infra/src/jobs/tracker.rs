//! Shared in-flight job counter.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::types::{BackgroundJob, JobKind};

#[derive(Debug, thiserror::Error)]
pub enum JobTrackerError {
    #[error("background jobs did not drain within {timeout:?} ({in_flight} still running)")]
    DrainTimeout { timeout: Duration, in_flight: usize },
}

#[derive(Debug, Default)]
struct TrackerState {
    in_flight: AtomicUsize,
    drained: Notify,
    /// Live registrations per `(kind, entity)`.
    per_entity: Mutex<HashMap<(JobKind, String), usize>>,
}

impl TrackerState {
    fn entities(&self) -> MutexGuard<'_, HashMap<(JobKind, String), usize>> {
        self.per_entity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self, job: &BackgroundJob) {
        *self
            .entities()
            .entry((job.kind, job.entity_id.clone()))
            .or_default() += 1;
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self, job: &BackgroundJob) {
        {
            let mut entities = self.entities();
            let key = (job.kind, job.entity_id.clone());
            if let Some(n) = entities.get_mut(&key) {
                *n -= 1;
                if *n == 0 {
                    entities.remove(&key);
                }
            }
        }
        let previous = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => {
                self.drained.notify_waiters();
            }
            Ok(_) => {}
            Err(_) => {
                error!("job tracker released more jobs than were registered");
            }
        }
    }
}

/// Counts background jobs that are registered but not finished.
///
/// Cloning is cheap; every clone shares the same counter. The count itself is
/// not exposed: callers register work and wait for the drain.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    state: Arc<TrackerState>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one job.
    ///
    /// Call this in the initiating context, before the work is handed to the
    /// runtime, so a drain that starts after the caller returns always sees it.
    /// The job completes when the returned guard is dropped or completed,
    /// whichever way the work ends.
    pub fn register(&self, kind: JobKind, entity_id: impl Into<String>) -> JobGuard {
        let job = BackgroundJob::new(kind, entity_id);
        self.state.acquire(&job);
        debug!(job_id = %job.id, kind = %job.kind, entity_id = %job.entity_id, "job registered");
        JobGuard {
            state: self.state.clone(),
            job,
        }
    }

    /// Register a job and run it on the tokio runtime.
    ///
    /// Registration happens before this returns. The guard lives inside the
    /// spawned task, so the job is released on success, error and panic alike.
    pub fn spawn<F, Fut>(&self, kind: JobKind, entity_id: impl Into<String>, work: F) -> JoinHandle<()>
    where
        F: FnOnce(BackgroundJob) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(kind, entity_id).spawn(work)
    }

    /// Whether a `kind` job for `entity_id` is registered and not finished.
    ///
    /// Only jobs of this process are visible.
    pub fn is_running(&self, kind: JobKind, entity_id: &str) -> bool {
        self.state.entities().contains_key(&(kind, entity_id.to_owned()))
    }

    /// Wait until every job registered before the count reaches zero has
    /// finished.
    ///
    /// Returns the first time the counter is observed at zero after the call.
    /// Jobs registered after that moment are not awaited.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.state.drained.notified();
            tokio::pin!(notified);
            // Enable before reading the count so a release between the check
            // and the await still wakes us.
            notified.as_mut().enable();
            if self.state.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// [`wait_drained`](Self::wait_drained) bounded by `timeout`.
    pub async fn wait_drained_for(&self, timeout: Duration) -> Result<(), JobTrackerError> {
        match tokio::time::timeout(timeout, self.wait_drained()).await {
            Ok(()) => {
                info!("background jobs drained");
                Ok(())
            }
            Err(_) => Err(JobTrackerError::DrainTimeout {
                timeout,
                in_flight: self.in_flight(),
            }),
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::Acquire)
    }
}

/// Registration handle for one in-flight job.
///
/// Dropping the guard completes the job exactly once.
#[derive(Debug)]
#[must_use = "dropping the guard immediately completes the job"]
pub struct JobGuard {
    state: Arc<TrackerState>,
    job: BackgroundJob,
}

impl JobGuard {
    pub fn job(&self) -> &BackgroundJob {
        &self.job
    }

    /// Run `work` on the tokio runtime under this registration.
    ///
    /// Lets a caller register first, persist the state the job will drive,
    /// and only then start the work.
    pub fn spawn<F, Fut>(self, work: F) -> JoinHandle<()>
    where
        F: FnOnce(BackgroundJob) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let fut = work(self.job.clone());
        tokio::spawn(async move {
            fut.await;
            self.complete();
        })
    }

    /// Mark the job finished.
    pub fn complete(self) {
        debug!(job_id = %self.job.id, kind = %self.job.kind, "job completed");
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.state.release(&self.job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn wait_returns_immediately_when_idle() {
        let tracker = JobTracker::new();
        tokio::time::timeout(Duration::from_millis(100), tracker.wait_drained())
            .await
            .expect("idle tracker should drain at once");
    }

    #[tokio::test]
    async fn wait_blocks_until_registered_jobs_finish() {
        let tracker = JobTracker::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let finished = Arc::new(AtomicBool::new(false));

        let flag = finished.clone();
        tracker.spawn(JobKind::Upload, "p-1", move |_job| async move {
            let _ = release_rx.await;
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(tracker.in_flight(), 1);

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_drained().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        release_tx.send(()).unwrap();
        waiter.await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn guard_drop_releases_without_explicit_complete() {
        let tracker = JobTracker::new();
        {
            let _guard = tracker.register(JobKind::ReportRefresh, "t-1");
            assert_eq!(tracker.in_flight(), 1);
        }
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn panicking_job_still_completes() {
        let tracker = JobTracker::new();
        let handle = tracker.spawn(JobKind::Upload, "p-boom", |_job| async move {
            panic!("upload exploded");
        });
        let joined = handle.await;
        assert!(joined.unwrap_err().is_panic());

        tokio::time::timeout(Duration::from_millis(100), tracker.wait_drained())
            .await
            .expect("panicked job must not block the drain");
    }

    #[tokio::test]
    async fn many_concurrent_jobs_drain_to_zero() {
        let tracker = JobTracker::new();
        for i in 0..64 {
            tracker.spawn(JobKind::Upload, format!("p-{i}"), move |_job| async move {
                tokio::time::sleep(Duration::from_millis((i % 7) as u64)).await;
            });
        }
        tracker.wait_drained().await;
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn drain_timeout_reports_remaining_jobs() {
        let tracker = JobTracker::new();
        let _stuck = tracker.register(JobKind::Upload, "p-stuck");

        let err = tracker
            .wait_drained_for(Duration::from_millis(20))
            .await
            .unwrap_err();
        match err {
            JobTrackerError::DrainTimeout { in_flight, .. } => assert_eq!(in_flight, 1),
        }
    }

    #[tokio::test]
    async fn jobs_registered_after_drain_point_are_not_awaited() {
        let tracker = JobTracker::new();
        tracker.wait_drained().await;

        // Registered after the drain returned; a fresh wait would block on it.
        let late = tracker.register(JobKind::Upload, "p-late");
        assert_eq!(tracker.in_flight(), 1);
        drop(late);
        tracker.wait_drained().await;
    }

    #[tokio::test]
    async fn all_waiters_wake_on_drain() {
        let tracker = JobTracker::new();
        let guard = tracker.register(JobKind::Upload, "p-1");

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.wait_drained().await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(10)).await;

        guard.complete();
        for waiter in waiters {
            tokio::time::timeout(Duration::from_millis(200), waiter)
                .await
                .expect("waiter woke")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn tracks_running_jobs_per_entity() {
        let tracker = JobTracker::new();
        assert!(!tracker.is_running(JobKind::Upload, "u-1"));

        let first = tracker.register(JobKind::Upload, "u-1");
        let second = tracker.register(JobKind::Upload, "u-1");
        assert!(tracker.is_running(JobKind::Upload, "u-1"));
        assert!(!tracker.is_running(JobKind::Upload, "u-2"));
        assert!(!tracker.is_running(JobKind::ReportRefresh, "u-1"));

        drop(first);
        assert!(tracker.is_running(JobKind::Upload, "u-1"));
        second.complete();
        assert!(!tracker.is_running(JobKind::Upload, "u-1"));
    }

    #[tokio::test]
    async fn guard_spawn_keeps_the_registration_until_the_work_ends() {
        let tracker = JobTracker::new();
        let guard = tracker.register(JobKind::Upload, "u-9");
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let handle = guard.spawn(|job| async move {
            assert_eq!(job.entity_id, "u-9");
            let _ = release_rx.await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(tracker.is_running(JobKind::Upload, "u-9"));

        release_tx.send(()).unwrap();
        handle.await.unwrap();
        assert!(!tracker.is_running(JobKind::Upload, "u-9"));
        tracker.wait_drained().await;
    }
}
