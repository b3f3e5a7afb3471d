// src/metrics.rs

//! Timing and memory measurement for sandbox workers.
//!
//! This module measures:
//! - Wall-clock duration of a single execution
//! - Peak memory usage (RSS) of the worker process
//!
//! Memory is polled with `sysinfo`, so the peak is approximate: short spikes
//! between samples are missed, and a worker that exits before the first
//! sample reports `None`.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use sysinfo::{Pid, System};

/// Metrics collected for a single execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvocationMetrics {
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Peak RSS memory in KB (best-effort).
    pub max_rss_kb: Option<u64>,
}

impl InvocationMetrics {
    pub fn new(duration: Duration, max_rss_kb: Option<u64>) -> Self {
        Self {
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            max_rss_kb,
        }
    }
}

/// Samples the resident set size of a worker on a background thread and
/// keeps the peak.
///
/// Stops on its own once the worker is gone; dropping the tracker stops it
/// too. The sampler thread is detached, so reading the peak never waits on
/// it and is safe from async code.
pub struct MemoryTracker {
    shared: Arc<Sampler>,
}

struct Sampler {
    stop: AtomicBool,
    peak_kb: AtomicU64,
}

impl MemoryTracker {
    /// Begin sampling process `pid` every `interval`.
    pub fn start(pid: u32, interval: Duration) -> Self {
        let shared = Arc::new(Sampler {
            stop: AtomicBool::new(false),
            peak_kb: AtomicU64::new(0),
        });

        let sampler = Arc::clone(&shared);
        thread::spawn(move || sampler.run(Pid::from_u32(pid), interval));

        Self { shared }
    }

    /// Stop sampling and return the peak RSS in KB, if any sample landed.
    ///
    /// The sampler exits after its current sleep.
    pub fn stop_and_take(self) -> Option<u64> {
        self.shared.stop.store(true, Ordering::Relaxed);
        Some(self.shared.peak_kb.load(Ordering::Relaxed)).filter(|kb| *kb > 0)
    }
}

impl Sampler {
    fn run(&self, pid: Pid, interval: Duration) {
        let mut system = System::new();

        while !self.stop.load(Ordering::Relaxed) {
            if !system.refresh_process(pid) {
                break;
            }
            let Some(process) = system.process(pid) else {
                break;
            };

            // sysinfo reports bytes
            self.peak_kb.fetch_max(process.memory() / 1024, Ordering::Relaxed);

            thread::sleep(interval);
        }
    }
}

impl Drop for MemoryTracker {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_convert_duration_to_millis() {
        let m = InvocationMetrics::new(Duration::from_micros(2_500), Some(10));
        assert_eq!(m.duration_ms, 2);
        assert_eq!(m.max_rss_kb, Some(10));
    }

    #[test]
    fn tracker_samples_the_current_process() {
        let tracker = MemoryTracker::start(std::process::id(), Duration::from_millis(5));
        thread::sleep(Duration::from_millis(30));
        let peak = tracker.stop_and_take();
        assert!(peak.unwrap_or(0) > 0);
    }

    #[test]
    fn taking_the_peak_does_not_wait_for_the_sampler() {
        let tracker = MemoryTracker::start(std::process::id(), Duration::from_secs(10));
        thread::sleep(Duration::from_millis(50));

        let started = std::time::Instant::now();
        let peak = tracker.stop_and_take();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(peak.unwrap_or(0) > 0);
    }
}
