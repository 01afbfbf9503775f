//! Clock & Timing (§4.A). A monotonic instant source, a `sleep_until` that
//! parks a task until an absolute deadline, and a single-slot pulse
//! primitive that coalesces rather than backs up when its receiver is slow.

use crate::error::{SlsError, SlsResult};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Returns the current monotonic instant. Backed directly by
/// `std::time::Instant`, which is itself monotonic non-decreasing and
/// unaffected by wall-clock adjustments on every platform tokio targets.
pub fn now() -> Instant {
    Instant::now()
}

/// Suspend the caller until the given absolute instant. May return slightly
/// late (scheduler granularity); never early.
pub async fn sleep_until(deadline: Instant) {
    tokio::time::sleep_until(deadline.into()).await;
}

/// A periodic pulse source. Each call to `tick()` waits for the next
/// `period`-spaced deadline; if the receiver falls behind, at most one
/// pulse is coalesced (tokio's `interval` already applies this policy via
/// `MissedTickBehavior::Delay` by default, which we keep, since the
/// contract only requires no *unbounded* backlog, not catch-up ticks).
pub struct PulseSource {
    interval: tokio::time::Interval,
}

impl PulseSource {
    pub fn new(period: Duration) -> SlsResult<Self> {
        if period.is_zero() {
            return Err(SlsError::ClockError("pulse period must be non-zero".into()));
        }
        Ok(Self {
            interval: tokio::time::interval(period),
        })
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await;
        Instant::now()
    }
}

/// A single-slot, overwrite-latest channel used to multiplex a pulse onto a
/// receiver that is otherwise busy. Sending never blocks and never queues
/// more than the latest value, matching the "no unbounded backlog" clause
/// of §4.A.
pub fn pulse_channel(initial: u64) -> (watch::Sender<u64>, watch::Receiver<u64>) {
    watch::channel(initial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotone_across_calls() {
        let a = now();
        let b = now();
        assert!(b >= a);
    }

    #[tokio::test]
    async fn pulse_source_rejects_zero_period() {
        assert!(PulseSource::new(Duration::from_millis(0)).is_err());
    }

    #[tokio::test]
    async fn pulse_channel_overwrites_rather_than_queues() {
        let (tx, mut rx) = pulse_channel(0);
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.send(3).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 3);
    }
}
