//! Background thread driving one or more job managers.
//!
//! The executor owns no jobs. It repeatedly asks every registered manager
//! for its earliest pending job, parks until the soonest target time, then
//! offers that job back through [`JobManager::run_single_job`]. The offer
//! is rejected whenever the queue moved in the meantime, in which case the
//! executor simply looks again. Managers are held weakly and dropped once
//! their window is gone.
//!
//! The loop parks against the system clock, so only managers on the system
//! clock belong here; a manager on a virtual clock is driven directly.

use super::{JobManager, JobView};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Park bound. Registration and scheduling go through the managers, not
/// the executor, so the loop re-checks the world at least this often.
const POLL_INTERVAL: Duration = Duration::from_millis(40);

struct ExecutorShared {
    managers: Mutex<Vec<Weak<JobManager>>>,
    wakeup: Condvar,
    shutdown: AtomicBool,
}

impl ExecutorShared {
    /// Upgrade the registered managers, pruning the dead ones.
    fn live_managers(&self) -> Vec<Arc<JobManager>> {
        let mut managers = self.managers.lock().unwrap();
        let live: Vec<Arc<JobManager>> = managers.iter().filter_map(Weak::upgrade).collect();
        if live.len() != managers.len() {
            *managers = live.iter().map(Arc::downgrade).collect();
        }
        live
    }

    fn park(&self, duration: Duration) {
        let guard = self.managers.lock().unwrap();
        let _unused = self.wakeup.wait_timeout(guard, duration).unwrap();
    }
}

/// Single background thread executing due jobs across managers.
pub struct JobExecutor {
    shared: Arc<ExecutorShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl JobExecutor {
    /// Start the executor thread.
    pub fn start() -> Self {
        let shared = Arc::new(ExecutorShared {
            managers: Mutex::new(Vec::new()),
            wakeup: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let worker = shared.clone();
        let handle = std::thread::spawn(move || run_loop(&worker));
        Self {
            shared,
            thread: Mutex::new(Some(handle)),
        }
    }

    /// Put a manager under this executor's care. The reference is weak;
    /// dropping the manager elsewhere unregisters it.
    pub fn register(&self, manager: &Arc<JobManager>) {
        let mut managers = self.shared.managers.lock().unwrap();
        managers.push(Arc::downgrade(manager));
        drop(managers);
        self.wake();
    }

    /// Number of registered managers still alive.
    pub fn managed_count(&self) -> usize {
        self.shared.live_managers().len()
    }

    /// True until `shutdown` has run.
    pub fn is_running(&self) -> bool {
        !self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Nudge the loop to re-check its managers now.
    pub fn wake(&self) {
        self.shared.wakeup.notify_all();
    }

    /// Stop the thread and wait for it to exit. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.wake();
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for JobExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(shared: &ExecutorShared) {
    tracing::debug!("job executor started");
    while !shared.shutdown.load(Ordering::SeqCst) {
        match earliest_across(shared) {
            Some((manager, view)) => {
                let now = Instant::now();
                if view.target() <= now {
                    // A rejected offer means the queue changed under us;
                    // either way, re-peek immediately.
                    manager.run_single_job(&view);
                } else {
                    let until_due = view.target() - now;
                    shared.park(until_due.min(POLL_INTERVAL));
                }
            }
            None => shared.park(POLL_INTERVAL),
        }
    }
    tracing::debug!("job executor stopped");
}

/// The soonest pending job over all live managers.
fn earliest_across(shared: &ExecutorShared) -> Option<(Arc<JobManager>, JobView)> {
    let mut soonest: Option<(Arc<JobManager>, JobView)> = None;
    for manager in shared.live_managers() {
        if let Some(view) = manager.earliest_job() {
            let sooner = soonest
                .as_ref()
                .map_or(true, |(_, best)| view.target() < best.target());
            if sooner {
                soonest = Some((manager, view));
            }
        }
    }
    soonest
}
