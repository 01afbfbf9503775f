//! Scheduler / Subsystem Loop (§4.F): a fixed set of periodic subsystems,
//! each run as its own loop — `start := now(); body(ctx, dt); sleep_until
//! (start + period)` — with deadline monitoring and an exponential-backoff
//! restart policy that escalates to `FatalShutdown` once the restart budget
//! is exhausted.
//!
//! Priority is realized as task dispatch order rather than an OS real-time
//! scheduling class: each subsystem gets its own tokio task on a
//! multi-threaded runtime, which is the concurrency model §5 calls out as
//! an acceptable alternative to raw OS threads with `SCHED_FIFO`.

use crate::config::TaskConfig;
use crate::error::BodyFailure;
use crate::event_sink::EventSink;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One periodic subsystem body (§4.F: `name, period_ms, priority,
/// body(ctx, dt_s)`). `tick` is synchronous — task bodies are pure
/// compute over shared state, never allocating in the steady-state path
/// (§5), so there is no need for an async trait here.
pub trait PeriodicTask: Send {
    fn tick(&mut self, dt_s: f64) -> Result<(), BodyFailure>;
}

/// Per-task bookkeeping the scheduler exposes back to callers (e.g. for
/// the S5 deadline-miss-counter scenario).
#[derive(Debug, Clone)]
pub struct TaskStats {
    pub deadline_misses: Arc<AtomicU64>,
    pub restarts: Arc<AtomicU64>,
}

impl TaskStats {
    fn new() -> Self {
        Self {
            deadline_misses: Arc::new(AtomicU64::new(0)),
            restarts: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Owns the global shutdown flag and spawns/monitors periodic subsystems.
pub struct Scheduler {
    events: Arc<EventSink>,
    shutdown: Arc<AtomicBool>,
    max_restarts: u8,
}

impl Scheduler {
    pub fn new(events: Arc<EventSink>, shutdown: Arc<AtomicBool>, max_restarts: u8) -> Self {
        Self {
            events,
            shutdown,
            max_restarts,
        }
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Spawn one subsystem under the restart/deadline policy. `factory`
    /// builds a fresh task instance on every (re)start, since a body that
    /// failed may hold corrupted internal state — matching "restarts the
    /// subsystem," not "resumes the same struct."
    pub fn spawn<T, F>(
        &self,
        component: &'static str,
        config: TaskConfig,
        mut factory: F,
    ) -> (tokio::task::JoinHandle<()>, TaskStats)
    where
        T: PeriodicTask + 'static,
        F: FnMut() -> T + Send + 'static,
    {
        let events = Arc::clone(&self.events);
        let shutdown = Arc::clone(&self.shutdown);
        let max_restarts = self.max_restarts;
        let stats = TaskStats::new();
        let dm = Arc::clone(&stats.deadline_misses);
        let restarts = Arc::clone(&stats.restarts);

        let handle = tokio::spawn(async move {
            let mut restart_count: u32 = 0;
            'restart: loop {
                let mut task = factory();
                let period = config.period();
                let deadline = config.deadline();
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                let mut last = crate::clock::now();

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        return;
                    }
                    interval.tick().await;
                    let now = crate::clock::now();
                    let dt_s = now.duration_since(last).as_secs_f64();
                    last = now;

                    let start = crate::clock::now();
                    let result = task.tick(dt_s);
                    let elapsed = start.elapsed();

                    if elapsed > deadline {
                        dm.fetch_add(1, Ordering::Relaxed);
                        events.warn(
                            component,
                            &format!(
                                "deadline miss: body took {}ms, deadline {}ms",
                                elapsed.as_millis(),
                                deadline.as_millis()
                            ),
                        );
                    }

                    if let Err(failure) = result {
                        events.error(component, &format!("{failure}"));
                        restart_count += 1;
                        restarts.fetch_add(1, Ordering::Relaxed);
                        if restart_count > max_restarts as u32 {
                            events.critical(
                                component,
                                "restart budget exceeded, raising FatalShutdown",
                            );
                            shutdown.store(true, Ordering::Release);
                            return;
                        }
                        let backoff_secs = 1u64 << (restart_count - 1).min(20);
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                        continue 'restart;
                    }
                }
            }
        });

        (handle, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sink::Level;
    use std::sync::atomic::AtomicU32;

    struct CountingTask {
        ticks: Arc<AtomicU32>,
    }

    impl PeriodicTask for CountingTask {
        fn tick(&mut self, _dt_s: f64) -> Result<(), BodyFailure> {
            self.ticks.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    struct AlwaysFailingTask;
    impl PeriodicTask for AlwaysFailingTask {
        fn tick(&mut self, _dt_s: f64) -> Result<(), BodyFailure> {
            Err(BodyFailure::Failed("TEST"))
        }
    }

    struct SlowTask;
    impl PeriodicTask for SlowTask {
        fn tick(&mut self, _dt_s: f64) -> Result<(), BodyFailure> {
            std::thread::sleep(Duration::from_millis(20));
            Ok(())
        }
    }

    #[tokio::test]
    async fn ticks_advance_over_time() {
        let events = Arc::new(EventSink::new(Level::Debug));
        let shutdown = Arc::new(AtomicBool::new(false));
        let sched = Scheduler::new(events, shutdown.clone(), 3);
        let ticks = Arc::new(AtomicU32::new(0));
        let t = Arc::clone(&ticks);
        let (_handle, _stats) = sched.spawn("TEST", TaskConfig::new(5, 10), move || CountingTask {
            ticks: Arc::clone(&t),
        });
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.store(true, Ordering::Release);
        assert!(ticks.load(Ordering::Relaxed) >= 3);
    }

    #[tokio::test]
    async fn exhausting_restart_budget_raises_fatal_shutdown() {
        let events = Arc::new(EventSink::new(Level::Debug));
        let shutdown = Arc::new(AtomicBool::new(false));
        let sched = Scheduler::new(events, shutdown.clone(), 1);
        let (_handle, stats) =
            sched.spawn("TEST", TaskConfig::new(1, 10), || AlwaysFailingTask);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(shutdown.load(Ordering::Acquire));
        assert!(stats.restarts.load(Ordering::Relaxed) >= 1);
    }

    #[tokio::test]
    async fn slow_body_is_counted_as_deadline_miss() {
        let events = Arc::new(EventSink::new(Level::Debug));
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut cfg = TaskConfig::new(5, 10);
        cfg.deadline_factor = 1.0;
        let sched = Scheduler::new(events, shutdown.clone(), 3);
        let (_handle, stats) = sched.spawn("TEST", cfg, || SlowTask);
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.store(true, Ordering::Release);
        assert!(stats.deadline_misses.load(Ordering::Relaxed) >= 1);
    }
}
