//! Blocking waits on sample/event thresholds.
//!
//! The store publishes its counts here after every successful mutation;
//! waiters sleep on a condition variable and recheck their own threshold on
//! every broadcast. A waiter never touches the store lock.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::model::Counts;

/// Minimum counts a wait accepts. Both minimums must be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitThreshold {
    pub min_samples: u64,
    pub min_events: u64,
}

impl WaitThreshold {
    pub fn new(min_samples: u64, min_events: u64) -> Self {
        Self {
            min_samples,
            min_events,
        }
    }

    pub fn samples(min_samples: u64) -> Self {
        Self::new(min_samples, 0)
    }

    pub fn is_met(&self, counts: &Counts) -> bool {
        counts.samples >= self.min_samples && counts.events >= self.min_events
    }
}

/// Why a wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitOutcome {
    Satisfied,
    Timeout,
    /// The header was replaced while waiting.
    GenerationChanged,
    /// The cancel probe fired (the requesting peer went away).
    Cancelled,
}

impl WaitOutcome {
    /// Wire value. `Cancelled` is never sent.
    pub fn wire_code(self) -> Option<u32> {
        match self {
            WaitOutcome::Satisfied => Some(0),
            WaitOutcome::Timeout => Some(1),
            WaitOutcome::GenerationChanged => Some(2),
            WaitOutcome::Cancelled => None,
        }
    }

    pub fn from_wire_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(WaitOutcome::Satisfied),
            1 => Some(WaitOutcome::Timeout),
            2 => Some(WaitOutcome::GenerationChanged),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WaitOutcome::Satisfied => "satisfied",
            WaitOutcome::Timeout => "timeout",
            WaitOutcome::GenerationChanged => "generation_changed",
            WaitOutcome::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome plus the counts observed when the wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaitResult {
    pub outcome: WaitOutcome,
    pub counts: Counts,
}

/// Shared counts with broadcast wakeups.
#[derive(Debug)]
pub struct WaitCoordinator {
    counts: Mutex<Counts>,
    changed: Condvar,
    poll_interval: Duration,
}

impl WaitCoordinator {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            counts: Mutex::new(Counts::default()),
            changed: Condvar::new(),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counts> {
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record new counts and wake every waiter.
    pub fn publish(&self, counts: Counts) {
        *self.lock() = counts;
        self.changed.notify_all();
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Block until `threshold` is met, the generation changes, `timeout`
    /// elapses, or `cancelled` reports true.
    ///
    /// The timeout runs from the call, however many publishes happen in
    /// between. `cancelled` is consulted at most once per poll interval and
    /// without holding the counts lock. Fails with `NoHeader` if nothing has
    /// been published yet.
    pub fn wait_until<F>(
        &self,
        threshold: WaitThreshold,
        timeout: Duration,
        mut cancelled: F,
    ) -> Result<WaitResult>
    where
        F: FnMut() -> bool,
    {
        let started = Instant::now();
        let deadline = started.checked_add(timeout);
        let mut counts = self.lock();
        if counts.generation == 0 {
            return Err(StoreError::NoHeader);
        }
        let generation = counts.generation;
        let mut last_probe = started;

        loop {
            let outcome = if counts.generation != generation {
                Some(WaitOutcome::GenerationChanged)
            } else if threshold.is_met(&counts) {
                Some(WaitOutcome::Satisfied)
            } else {
                None
            };
            if let Some(outcome) = outcome {
                return Ok(WaitResult {
                    outcome,
                    counts: *counts,
                });
            }

            let now = Instant::now();
            let remaining = deadline.map(|d| d.saturating_duration_since(now));
            if remaining == Some(Duration::ZERO) {
                return Ok(WaitResult {
                    outcome: WaitOutcome::Timeout,
                    counts: *counts,
                });
            }

            if now.duration_since(last_probe) >= self.poll_interval {
                drop(counts);
                let gone = cancelled();
                counts = self.lock();
                last_probe = Instant::now();
                if gone {
                    return Ok(WaitResult {
                        outcome: WaitOutcome::Cancelled,
                        counts: *counts,
                    });
                }
                continue;
            }

            let slice = remaining.map_or(self.poll_interval, |r| r.min(self.poll_interval));
            counts = self
                .changed
                .wait_timeout(counts, slice)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn counts(generation: u64, samples: u64, events: u64) -> Counts {
        Counts {
            generation,
            samples,
            events,
        }
    }

    fn never() -> bool {
        false
    }

    #[test]
    fn no_header_fails() {
        let waits = WaitCoordinator::new(Duration::from_millis(10));
        assert_eq!(
            waits.wait_until(WaitThreshold::samples(1), Duration::from_millis(10), never),
            Err(StoreError::NoHeader)
        );
    }

    #[test]
    fn satisfied_immediately() {
        let waits = WaitCoordinator::new(Duration::from_millis(10));
        waits.publish(counts(1, 10, 2));
        let result = waits
            .wait_until(WaitThreshold::new(10, 2), Duration::ZERO, never)
            .unwrap();
        assert_eq!(result.outcome, WaitOutcome::Satisfied);
        assert_eq!(result.counts, counts(1, 10, 2));
    }

    #[test]
    fn both_thresholds_required() {
        let waits = WaitCoordinator::new(Duration::from_millis(10));
        waits.publish(counts(1, 10, 0));
        let result = waits
            .wait_until(WaitThreshold::new(5, 1), Duration::ZERO, never)
            .unwrap();
        assert_eq!(result.outcome, WaitOutcome::Timeout);
    }

    #[test]
    fn times_out_with_unchanged_counts() {
        let waits = WaitCoordinator::new(Duration::from_millis(10));
        waits.publish(counts(1, 100, 0));
        let started = Instant::now();
        let result = waits
            .wait_until(WaitThreshold::samples(150), Duration::from_millis(50), never)
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(result.outcome, WaitOutcome::Timeout);
        assert_eq!(result.counts.samples, 100);
    }

    #[test]
    fn deadline_holds_under_publish_load() {
        let waits = Arc::new(WaitCoordinator::new(Duration::from_millis(50)));
        waits.publish(counts(1, 0, 0));
        let stop = Arc::new(AtomicBool::new(false));

        let publisher = {
            let waits = Arc::clone(&waits);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut events = 0;
                while !stop.load(Ordering::Relaxed) {
                    events += 1;
                    waits.publish(counts(1, 0, events));
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        let started = Instant::now();
        let result = waits
            .wait_until(WaitThreshold::samples(1), Duration::from_millis(80), never)
            .unwrap();
        let elapsed = started.elapsed();
        stop.store(true, Ordering::Relaxed);
        publisher.join().unwrap();

        assert_eq!(result.outcome, WaitOutcome::Timeout);
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn two_waiters_wake_on_one_publish() {
        let waits = Arc::new(WaitCoordinator::new(Duration::from_millis(20)));
        waits.publish(counts(1, 0, 0));

        let spawn_waiter = |min: u64| {
            let waits = Arc::clone(&waits);
            thread::spawn(move || {
                waits
                    .wait_until(WaitThreshold::samples(min), Duration::from_secs(5), never)
                    .unwrap()
            })
        };
        let low = spawn_waiter(5);
        let high = spawn_waiter(50);

        thread::sleep(Duration::from_millis(50));
        waits.publish(counts(1, 60, 0));

        assert_eq!(low.join().unwrap().outcome, WaitOutcome::Satisfied);
        assert_eq!(high.join().unwrap().outcome, WaitOutcome::Satisfied);
    }

    #[test]
    fn generation_change_releases_waiter() {
        let waits = Arc::new(WaitCoordinator::new(Duration::from_millis(20)));
        waits.publish(counts(1, 0, 0));

        let waiter = {
            let waits = Arc::clone(&waits);
            thread::spawn(move || {
                waits
                    .wait_until(WaitThreshold::samples(10), Duration::from_secs(5), never)
                    .unwrap()
            })
        };
        thread::sleep(Duration::from_millis(50));
        waits.publish(counts(2, 0, 0));

        let result = waiter.join().unwrap();
        assert_eq!(result.outcome, WaitOutcome::GenerationChanged);
        assert_eq!(result.counts.generation, 2);
    }

    #[test]
    fn cancel_probe_ends_wait() {
        let waits = WaitCoordinator::new(Duration::from_millis(10));
        waits.publish(counts(1, 0, 0));
        let mut probes = 0;
        let result = waits
            .wait_until(WaitThreshold::samples(1), Duration::from_secs(5), || {
                probes += 1;
                probes >= 3
            })
            .unwrap();
        assert_eq!(result.outcome, WaitOutcome::Cancelled);
        assert_eq!(probes, 3);
    }

    #[test]
    fn outcome_wire_codes() {
        for outcome in [
            WaitOutcome::Satisfied,
            WaitOutcome::Timeout,
            WaitOutcome::GenerationChanged,
        ] {
            let code = outcome.wire_code().unwrap();
            assert_eq!(WaitOutcome::from_wire_code(code), Some(outcome));
        }
        assert_eq!(WaitOutcome::Cancelled.wire_code(), None);
        assert_eq!(WaitOutcome::from_wire_code(9), None);
    }
}
