//! Delayed and periodic background jobs, one manager per window.
//!
//! A [`JobManager`] owns the timer queue spawned by one window's scripts:
//! one-shot jobs (`setTimeout` style) and periodic jobs (`setInterval`
//! style). The manager only bookkeeps; an executor drives it by asking for
//! the earliest pending job and offering to run it, so every callback runs
//! outside the manager lock. Periodic jobs are rescheduled with drift
//! correction before their callback fires, skipping ticks that were missed
//! entirely while the executor was busy.
//!
//! The manager holds its window weakly. Once the window is collected, or
//! once the page that scheduled a job is no longer the window's current
//! page, new jobs are refused.

pub mod executor;

use crate::clock::{Clock, SystemClock};
use crate::window::{HostWindow, PageId};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

/// Counter backing [`JobId`] assignment, shared by every manager.
static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// JobId / JobSpec – what callers schedule
// ---------------------------------------------------------------------------

/// Identifier of a scheduled job, unique across all managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        JobId(NEXT_JOB_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// The raw numeric id handed back to script as the timer handle.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Work a job performs when its time comes.
pub type JobCallback = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// A job waiting to be scheduled: an initial delay, an optional repeat
/// period, and the callback to run.
#[derive(Clone)]
pub struct JobSpec {
    delay: Duration,
    period: Option<Duration>,
    name: Option<String>,
    callback: JobCallback,
}

impl JobSpec {
    /// A job that runs once after `delay_ms` milliseconds.
    pub fn one_shot<F>(delay_ms: u64, callback: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            delay: Duration::from_millis(delay_ms),
            period: None,
            name: None,
            callback: Arc::new(callback),
        }
    }

    /// A job that first runs after `delay_ms`, then repeats every
    /// `period_ms` milliseconds. Periods below one millisecond are raised
    /// to one.
    pub fn periodic<F>(delay_ms: u64, period_ms: u64, callback: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            delay: Duration::from_millis(delay_ms),
            period: Some(Duration::from_millis(period_ms.max(1))),
            name: None,
            callback: Arc::new(callback),
        }
    }

    /// Attach a diagnostic label shown in logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// True when the job repeats.
    pub fn is_periodic(&self) -> bool {
        self.period.is_some()
    }
}

impl fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSpec")
            .field("delay", &self.delay)
            .field("period", &self.period)
            .field("name", &self.name)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// JobView / stats – what observers see
// ---------------------------------------------------------------------------

/// Snapshot of a pending job, the handshake token between the manager and
/// its executor: the executor peeks the earliest job, sleeps until its
/// target time, then offers exactly this snapshot back to
/// [`JobManager::run_single_job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobView {
    id: JobId,
    target: Instant,
    periodic: bool,
    name: Option<String>,
}

impl JobView {
    /// The job's identifier.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// When the job wants to run.
    pub fn target(&self) -> Instant {
        self.target
    }

    /// True when the job repeats.
    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// The diagnostic label, if one was attached.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Counters the manager keeps about its lifetime activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobManagerStats {
    /// Jobs accepted by `add_job`.
    pub scheduled: u64,
    /// Callback runs attempted, failures included.
    pub executed: u64,
    /// Distinct jobs cancelled through `remove_job`, `stop_job` or
    /// `remove_all_jobs`.
    pub cancelled: u64,
    /// Callback runs that returned an error.
    pub callback_failures: u64,
}

// ---------------------------------------------------------------------------
// JobManager
// ---------------------------------------------------------------------------

struct ScheduledJob {
    id: JobId,
    name: Option<String>,
    target: Instant,
    period: Option<Duration>,
    callback: JobCallback,
}

struct RunningJob {
    id: JobId,
    target: Instant,
}

#[derive(Default)]
struct ManagerState {
    pending: Vec<ScheduledJob>,
    cancelled: FxHashSet<JobId>,
    running: Option<RunningJob>,
    stats: JobManagerStats,
}

impl ManagerState {
    fn earliest(&self) -> Option<&ScheduledJob> {
        self.pending.iter().min_by_key(|job| (job.target, job.id))
    }

    fn job_count(&self) -> usize {
        self.pending.len() + usize::from(self.running.is_some())
    }
}

/// Timer queue for one window's scripts.
pub struct JobManager {
    /// Weak so a closed window is not kept alive by its leftover timers.
    window: Weak<dyn HostWindow>,
    clock: Arc<dyn Clock>,
    state: Mutex<ManagerState>,
    wakeup: Condvar,
}

impl JobManager {
    /// Create a manager for the given window.
    pub fn new(window: Weak<dyn HostWindow>) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    /// Create a manager with a specific time source (deterministic tests).
    pub fn with_clock(window: Weak<dyn HostWindow>, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            state: Mutex::new(ManagerState::default()),
            wakeup: Condvar::new(),
        }
    }

    /// Schedule a job on behalf of `page`. Returns `None` when the owning
    /// window is gone, or when `page` is no longer that window's current
    /// page, so a page left behind by navigation cannot spawn work.
    pub fn add_job(&self, spec: JobSpec, page: PageId) -> Option<JobId> {
        let window = match self.window.upgrade() {
            Some(window) => window,
            None => {
                tracing::debug!("job refused: window no longer exists");
                return None;
            }
        };
        if window.enclosed_page() != page {
            tracing::debug!(page = ?page, "job refused: page no longer current");
            return None;
        }

        let id = JobId::next();
        let target = self.clock.now() + spec.delay;
        let mut state = self.state.lock().unwrap();
        state.pending.push(ScheduledJob {
            id,
            name: spec.name,
            target,
            period: spec.period,
            callback: spec.callback,
        });
        state.stats.scheduled += 1;
        tracing::debug!(
            job = %id,
            delay_ms = spec.delay.as_millis() as u64,
            periodic = spec.period.is_some(),
            "job scheduled"
        );
        self.wakeup.notify_all();
        Some(id)
    }

    /// Cancel a pending job. A job already mid-callback finishes, but a
    /// periodic one will not be rescheduled. Unknown ids are recorded in
    /// the cancelled set all the same, so a cancel racing the job's own
    /// reschedule still lands.
    pub fn remove_job(&self, id: JobId) {
        let mut state = self.state.lock().unwrap();
        state.pending.retain(|job| job.id != id);
        if state.cancelled.insert(id) {
            state.stats.cancelled += 1;
            tracing::debug!(job = %id, "job cancelled");
        }
        self.wakeup.notify_all();
    }

    /// Cancel a job, intended for repeating jobs (`clearInterval`). The
    /// current callback cannot be interrupted; the cancellation takes
    /// effect at the reschedule point.
    pub fn stop_job(&self, id: JobId) {
        self.remove_job(id);
    }

    /// Cancel everything, the currently running job included.
    pub fn remove_all_jobs(&self) {
        let mut state = self.state.lock().unwrap();
        let running = state.running.as_ref().map(|job| job.id);
        let ids: Vec<JobId> = state.pending.iter().map(|job| job.id).collect();
        state.pending.clear();
        for id in ids.into_iter().chain(running) {
            if state.cancelled.insert(id) {
                state.stats.cancelled += 1;
            }
        }
        self.wakeup.notify_all();
    }

    /// The pending job with the earliest target time, ties broken by
    /// scheduling order.
    pub fn earliest_job(&self) -> Option<JobView> {
        let state = self.state.lock().unwrap();
        state.earliest().map(|job| JobView {
            id: job.id,
            target: job.target,
            periodic: job.period.is_some(),
            name: job.name.clone(),
        })
    }

    /// Pending jobs plus the running one, if any.
    pub fn job_count(&self) -> usize {
        self.state.lock().unwrap().job_count()
    }

    /// Lifetime counters.
    pub fn stats(&self) -> JobManagerStats {
        self.state.lock().unwrap().stats.clone()
    }

    /// Run `offered` if it is still the earliest pending job and its time
    /// has come; otherwise report `false` so the caller re-peeks. A
    /// periodic job is rescheduled before its callback runs, unless it was
    /// cancelled in the meantime. The callback itself runs without the
    /// manager lock held and may schedule or cancel jobs freely.
    pub fn run_single_job(&self, offered: &JobView) -> bool {
        let (id, callback) = {
            let mut state = self.state.lock().unwrap();
            let index = match state
                .pending
                .iter()
                .enumerate()
                .min_by_key(|(_, job)| (job.target, job.id))
                .map(|(index, _)| index)
            {
                Some(index) => index,
                None => return false,
            };
            if state.pending[index].id != offered.id() {
                return false;
            }
            let now = self.clock.now();
            if state.pending[index].target > now {
                return false;
            }

            let job = state.pending.swap_remove(index);
            state.running = Some(RunningJob {
                id: job.id,
                target: job.target,
            });

            if let Some(period) = job.period {
                if !state.cancelled.contains(&job.id) {
                    let next = next_periodic_target(job.target, period, now);
                    tracing::trace!(
                        job = %job.id,
                        late_ms = now.saturating_duration_since(job.target).as_millis() as u64,
                        "periodic job rescheduled"
                    );
                    state.pending.push(ScheduledJob {
                        id: job.id,
                        name: job.name.clone(),
                        target: next,
                        period: Some(period),
                        callback: job.callback.clone(),
                    });
                    self.wakeup.notify_all();
                }
            }
            (job.id, job.callback)
        };

        if let Err(err) = callback() {
            tracing::error!(job = %id, "job callback failed: {err:#}");
            self.state.lock().unwrap().stats.callback_failures += 1;
        }

        let mut state = self.state.lock().unwrap();
        state.stats.executed += 1;
        if state.running.as_ref().map(|job| job.id) == Some(id) {
            state.running = None;
        }
        self.wakeup.notify_all();
        true
    }

    /// Block until no job is pending or running, or until `timeout_millis`
    /// elapses. A non-positive timeout checks once without blocking.
    /// Returns the job count on exit. Somebody else must be draining the
    /// queue; the wait itself runs nothing.
    pub fn wait_for_jobs(&self, timeout_millis: i64) -> usize {
        if timeout_millis > 0 {
            let deadline = self.clock.now() + Duration::from_millis(timeout_millis as u64);
            let mut state = self.state.lock().unwrap();
            while state.job_count() > 0 {
                let now = self.clock.now();
                if now >= deadline {
                    break;
                }
                let (guard, _) = self.wakeup.wait_timeout(state, deadline - now).unwrap();
                state = guard;
            }
        }
        let count = self.job_count();
        tracing::debug!(remaining = count, "finished waiting for jobs");
        count
    }

    /// Block until no pending or running job targets a time strictly
    /// before now plus `horizon_millis`. The cutoff is computed once at
    /// entry, so jobs rescheduled past the horizon while waiting do not
    /// extend the wait. Returns the job count on exit.
    pub fn wait_for_jobs_starting_before(&self, horizon_millis: i64) -> usize {
        let cutoff = self.clock.now() + Duration::from_millis(horizon_millis.max(0) as u64);
        let interval = Duration::from_millis(horizon_millis.max(40) as u64);
        let mut state = self.state.lock().unwrap();
        loop {
            let busy = state
                .running
                .as_ref()
                .map_or(false, |job| job.target < cutoff)
                || state.earliest().map_or(false, |job| job.target < cutoff);
            if !busy {
                break;
            }
            let (guard, _) = self.wakeup.wait_timeout(state, interval).unwrap();
            state = guard;
        }
        let count = state.job_count();
        drop(state);
        tracing::debug!(remaining = count, "finished waiting for jobs inside horizon");
        count
    }

    /// Drop every pending job and wake all waiters. Safe to call more than
    /// once. A callback already running finishes undisturbed.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        let dropped = state.pending.len();
        state.pending.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "job manager shut down with jobs pending");
        }
        self.wakeup.notify_all();
    }
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("JobManager")
            .field("pending", &state.pending.len())
            .field("running", &state.running.is_some())
            .field("stats", &state.stats)
            .finish()
    }
}

/// Next target for a periodic job that just became due: the first multiple
/// of `period` after `target` that is still in the future relative to
/// `now`. Ticks missed entirely while the queue was backed up are skipped
/// rather than replayed back-to-back.
fn next_periodic_target(target: Instant, period: Duration, now: Instant) -> Instant {
    let period_ms = (period.as_millis() as u64).max(1);
    let late_ms = now.saturating_duration_since(target).as_millis() as u64;
    let advance_ms = (late_ms / period_ms + 1) * period_ms;
    target + Duration::from_millis(advance_ms)
}
