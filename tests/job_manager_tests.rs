//! Integration tests for timer scheduling and the background executor
//!
//! NOTE: companion files cover the other subsystems:
//!   - registry_binding_tests.rs (class exposure and object binding)
//!   - execution_context_tests.rs (compilation, scope chains, timeouts)

mod common;

use common::init_tracing;
use gossamer::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

fn virtual_manager() -> (Arc<dyn HostWindow>, PageId, Arc<VirtualClock>, Arc<JobManager>) {
    init_tracing();
    let page = PageId::next();
    let window: Arc<dyn HostWindow> = Arc::new(Window::open(page));
    let clock = Arc::new(VirtualClock::new());
    let manager = Arc::new(JobManager::with_clock(Arc::downgrade(&window), clock.clone()));
    (window, page, clock, manager)
}

fn real_manager() -> (Arc<dyn HostWindow>, PageId, Arc<JobManager>) {
    init_tracing();
    let page = PageId::next();
    let window: Arc<dyn HostWindow> = Arc::new(Window::open(page));
    let manager = Arc::new(JobManager::new(Arc::downgrade(&window)));
    (window, page, manager)
}

fn counter_spec(delay_ms: u64, hits: &Arc<AtomicU32>) -> JobSpec {
    let hits = hits.clone();
    JobSpec::one_shot(delay_ms, move || {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

mod scheduling {
    use super::*;

    #[test]
    fn test_collected_window_yields_sentinel_and_count_is_unaffected() {
        let (window, page, clock, manager) = virtual_manager();
        let hits = Arc::new(AtomicU32::new(0));
        manager.add_job(counter_spec(50, &hits), page).unwrap();
        assert_eq!(manager.job_count(), 1);

        drop(window);
        assert!(manager.add_job(counter_spec(0, &hits), page).is_none());
        assert_eq!(manager.job_count(), 1);

        // The leftover job is still runnable once due.
        clock.advance_millis(50);
        let view = manager.earliest_job().unwrap();
        assert!(manager.run_single_job(&view));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_one_shot_runs_only_once_its_time_has_come() {
        let (_window, page, clock, manager) = virtual_manager();
        let hits = Arc::new(AtomicU32::new(0));
        manager.add_job(counter_spec(100, &hits), page).unwrap();
        let view = manager.earliest_job().unwrap();

        // Early offer: refused, nothing runs, count untouched.
        clock.advance_millis(99);
        assert!(!manager.run_single_job(&view));
        assert_eq!(manager.job_count(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        clock.advance_millis(1);
        assert!(manager.run_single_job(&view));
        assert_eq!(manager.job_count(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_job_ids_are_unique_across_managers() {
        let (_w1, page1, _c1, first) = virtual_manager();
        let (_w2, page2, _c2, second) = virtual_manager();
        let hits = Arc::new(AtomicU32::new(0));
        let a = first.add_job(counter_spec(10, &hits), page1).unwrap();
        let b = second.add_job(counter_spec(10, &hits), page2).unwrap();
        let c = first.add_job(counter_spec(10, &hits), page1).unwrap();
        assert!(a != b && b != c && a != c);
    }
}

mod periodic {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_missed_tick_reschedules_to_next_boundary_not_a_burst() {
        let (_window, page, clock, manager) = virtual_manager();
        let start = clock.now();
        let hits = Arc::new(AtomicU32::new(0));
        let spec = {
            let hits = hits.clone();
            JobSpec::periodic(100, 100, move || {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        manager.add_job(spec, page).unwrap();

        // First target T0 = start+100; the driver shows up at T0+250.
        clock.advance_millis(350);
        let view = manager.earliest_job().unwrap();
        assert!(manager.run_single_job(&view));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // One rescheduled instance at T0+300, no catch-up burst.
        assert_eq!(manager.job_count(), 1);
        let next = manager.earliest_job().unwrap();
        assert_eq!(next.target(), start + Duration::from_millis(400));
    }

    proptest! {
        /// However late the driver is, the rescheduled target stays aligned
        /// to the original period grid and lands strictly in the future.
        #[test]
        fn prop_reschedule_is_grid_aligned_and_future(
            delay_ms in 0u64..500,
            period_ms in 1u64..300,
            late_ms in 0u64..2_000,
        ) {
            let (_window, page, clock, manager) = virtual_manager();
            let start = clock.now();
            manager
                .add_job(JobSpec::periodic(delay_ms, period_ms, || Ok(())), page)
                .unwrap();

            clock.advance_millis(delay_ms + late_ms);
            let view = manager.earliest_job().unwrap();
            prop_assert!(manager.run_single_job(&view));

            let next = manager.earliest_job().unwrap();
            let now = clock.now();
            prop_assert!(next.target() > now);

            let first_target = start + Duration::from_millis(delay_ms);
            let offset = next.target().duration_since(first_target).as_millis() as u64;
            prop_assert_eq!(offset % period_ms, 0);
        }
    }
}

mod cancellation {
    use super::*;

    #[test]
    fn test_removed_job_never_runs_even_via_stale_view() {
        let (_window, page, clock, manager) = virtual_manager();
        let hits = Arc::new(AtomicU32::new(0));
        let id = manager.add_job(counter_spec(10, &hits), page).unwrap();
        let stale = manager.earliest_job().unwrap();

        manager.remove_job(id);
        clock.advance_millis(100);
        assert!(!manager.run_single_job(&stale));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(manager.job_count(), 0);
    }

    #[test]
    fn test_stop_during_run_prevents_the_reschedule() {
        let (_window, page, manager) = real_manager();
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let spec = JobSpec::periodic(0, 50, move || {
            entered_tx.send(()).ok();
            release_rx.lock().unwrap().recv().ok();
            Ok(())
        });
        let id = manager.add_job(spec, page).unwrap();
        let view = manager.earliest_job().unwrap();

        let runner = {
            let manager = manager.clone();
            std::thread::spawn(move || manager.run_single_job(&view))
        };

        // The callback is in flight; its reschedule already happened.
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("callback never started");
        assert_eq!(manager.job_count(), 2);

        // clearInterval while the handler runs: the queued repeat goes away.
        manager.stop_job(id);
        release_tx.send(()).unwrap();
        assert!(runner.join().unwrap());
        assert_eq!(manager.job_count(), 0);
    }

    #[test]
    fn test_remove_all_jobs_cancels_the_running_job_too() {
        let (_window, page, manager) = real_manager();
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let spec = JobSpec::periodic(0, 50, move || {
            entered_tx.send(()).ok();
            release_rx.lock().unwrap().recv().ok();
            Ok(())
        });
        manager.add_job(spec, page).unwrap();
        let view = manager.earliest_job().unwrap();

        let runner = {
            let manager = manager.clone();
            std::thread::spawn(move || manager.run_single_job(&view))
        };
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("callback never started");

        manager.remove_all_jobs();
        release_tx.send(()).unwrap();
        assert!(runner.join().unwrap());
        assert_eq!(manager.job_count(), 0);
        assert!(manager.stats().cancelled >= 1);
    }
}

mod waiting {
    use super::*;

    #[test]
    fn test_wait_for_jobs_zero_reports_two_pending_without_blocking() {
        let (_window, page, manager) = real_manager();
        let hits = Arc::new(AtomicU32::new(0));
        manager.add_job(counter_spec(60_000, &hits), page).unwrap();
        manager.add_job(counter_spec(60_000, &hits), page).unwrap();

        let started = Instant::now();
        assert_eq!(manager.wait_for_jobs(0), 2);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_for_jobs_returns_once_executor_drains_the_queue() {
        let (_window, page, manager) = real_manager();
        let executor = JobExecutor::start();
        executor.register(&manager);

        let hits = Arc::new(AtomicU32::new(0));
        manager.add_job(counter_spec(10, &hits), page).unwrap();
        manager.add_job(counter_spec(30, &hits), page).unwrap();

        assert_eq!(manager.wait_for_jobs(5_000), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        executor.shutdown();
    }

    #[test]
    fn test_wait_for_jobs_gives_up_at_the_deadline() {
        let (_window, page, manager) = real_manager();
        let hits = Arc::new(AtomicU32::new(0));
        manager.add_job(counter_spec(60_000, &hits), page).unwrap();

        let started = Instant::now();
        assert_eq!(manager.wait_for_jobs(50), 1);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(5));
    }
}

mod lifecycle {
    use super::*;

    #[test]
    fn test_shutdown_wakes_blocked_waiters() {
        let (_window, page, manager) = real_manager();
        let hits = Arc::new(AtomicU32::new(0));
        manager.add_job(counter_spec(60_000, &hits), page).unwrap();

        let waiter = {
            let manager = manager.clone();
            std::thread::spawn(move || manager.wait_for_jobs(30_000))
        };
        std::thread::sleep(Duration::from_millis(50));
        manager.shutdown();
        let remaining = waiter.join().unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_callback_error_does_not_abort_other_jobs() {
        let (_window, page, manager) = real_manager();
        let executor = JobExecutor::start();
        executor.register(&manager);

        let hits = Arc::new(AtomicU32::new(0));
        manager
            .add_job(
                JobSpec::one_shot(5, || anyhow::bail!("first handler broke")).named("broken"),
                page,
            )
            .unwrap();
        manager.add_job(counter_spec(20, &hits), page).unwrap();

        assert_eq!(manager.wait_for_jobs(5_000), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let stats = manager.stats();
        assert_eq!(stats.callback_failures, 1);
        assert_eq!(stats.executed, 2);
        executor.shutdown();
    }

    #[test]
    fn test_stats_serialize_for_diagnostics() {
        let (_window, page, clock, manager) = virtual_manager();
        let hits = Arc::new(AtomicU32::new(0));
        manager.add_job(counter_spec(0, &hits), page).unwrap();
        clock.advance_millis(1);
        let view = manager.earliest_job().unwrap();
        manager.run_single_job(&view);

        let stats = manager.stats();
        let json = serde_json::to_string(&stats).unwrap();
        let parsed: JobManagerStats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stats);
        assert_eq!(parsed.scheduled, 1);
        assert_eq!(parsed.executed, 1);
    }
}
