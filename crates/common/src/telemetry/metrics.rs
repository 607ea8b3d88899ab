//! Readable process-wide metrics registry.
//!
//! Series identity is name + sorted tag set. Handles are cheap clones over
//! shared atomics, so registering the same series twice hands back the same
//! underlying cells and every update is a single atomic operation. The
//! registry's own map is only locked at registration time, never on the
//! hot path and never across an await.
//!
//! Naming follows the usual conventions: service prefix, `_total` suffix
//! for counters, `_seconds` suffix for duration series.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Timer bucket upper bounds, in nanoseconds.
///
/// Tuned for the simulated latencies in this system: tens of milliseconds
/// for fast paths up to several seconds for slow jobs. Samples beyond the
/// last bound land in an overflow bucket.
const BUCKET_BOUNDS_NANOS: [u64; 9] = [
    50_000_000,     // 50ms
    100_000_000,    // 100ms
    250_000_000,    // 250ms
    500_000_000,    // 500ms
    1_000_000_000,  // 1s
    2_500_000_000,  // 2.5s
    5_000_000_000,  // 5s
    8_000_000_000,  // 8s
    10_000_000_000, // 10s
];

/// Series identity: name plus sorted tag pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    name: String,
    tags: Vec<(String, String)>,
}

impl SeriesKey {
    fn new(name: &str, tags: &[(&str, &str)]) -> Self {
        let mut tags: Vec<(String, String)> = tags
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        tags.sort();
        Self {
            name: name.to_string(),
            tags,
        }
    }
}

/// Monotonic counter handle.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    cell: Arc<AtomicU64>,
}

impl Counter {
    /// Increment by one.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Increment by `delta`.
    pub fn add(&self, delta: u64) {
        self.cell.fetch_add(delta, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.cell.load(Ordering::Relaxed)
    }
}

/// Gauge handle tracking a concurrently-active unit count.
///
/// Never goes negative: decrements saturate at zero. Callers pair
/// increments and decrements through [`Gauge::track`], which releases on
/// every exit path.
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    cell: Arc<AtomicI64>,
}

impl Gauge {
    /// Increment by one.
    pub fn increment(&self) {
        self.cell.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement by one, saturating at zero.
    pub fn decrement(&self) {
        // CAS loop rather than fetch_sub so a stray release can never
        // drive the value below zero.
        let _ = self
            .cell
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some((v - 1).max(0))
            });
    }

    /// Set to an absolute value, clamped at zero.
    pub fn set(&self, value: i64) {
        self.cell.store(value.max(0), Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.cell.load(Ordering::Relaxed)
    }

    /// Increment now, decrement when the guard drops.
    #[must_use]
    pub fn track(&self) -> GaugeGuard {
        self.increment();
        GaugeGuard {
            gauge: self.clone(),
        }
    }
}

/// Scoped gauge acquisition: created by [`Gauge::track`], releases exactly
/// once on drop regardless of how the owning scope exits.
#[derive(Debug)]
pub struct GaugeGuard {
    gauge: Gauge,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.decrement();
    }
}

#[derive(Debug, Default)]
struct TimerCells {
    count: AtomicU64,
    sum_nanos: AtomicU64,
    buckets: [AtomicU64; BUCKET_BOUNDS_NANOS.len()],
    overflow: AtomicU64,
}

/// Duration recorder handle.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    cells: Arc<TimerCells>,
}

impl Timer {
    /// Record one duration sample.
    pub fn record(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.cells.count.fetch_add(1, Ordering::Relaxed);
        self.cells.sum_nanos.fetch_add(nanos, Ordering::Relaxed);
        let bucket = BUCKET_BOUNDS_NANOS
            .iter()
            .zip(self.cells.buckets.iter())
            .find(|(bound, _)| nanos <= **bound)
            .map(|(_, cell)| cell);
        match bucket {
            Some(cell) => cell.fetch_add(1, Ordering::Relaxed),
            None => self.cells.overflow.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Start timing now; the sample is recorded when the guard drops.
    #[must_use]
    pub fn start(&self) -> TimerGuard {
        TimerGuard {
            timer: self.clone(),
            started: Instant::now(),
        }
    }

    /// Number of recorded samples.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.cells.count.load(Ordering::Relaxed)
    }

    /// Sum of all recorded samples.
    #[must_use]
    pub fn sum(&self) -> Duration {
        Duration::from_nanos(self.cells.sum_nanos.load(Ordering::Relaxed))
    }

    /// Consistent-enough view of count, sum, and the bucketed distribution.
    #[must_use]
    pub fn snapshot(&self) -> TimerSnapshot {
        let count = self.count();
        let sum = self.sum();
        let buckets = BUCKET_BOUNDS_NANOS
            .iter()
            .zip(self.cells.buckets.iter())
            .map(|(bound, cell)| (Duration::from_nanos(*bound), cell.load(Ordering::Relaxed)))
            .collect();
        TimerSnapshot {
            count,
            sum,
            buckets,
            overflow: self.cells.overflow.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a timer series.
#[derive(Debug, Clone)]
pub struct TimerSnapshot {
    /// Number of samples.
    pub count: u64,
    /// Sum of all samples.
    pub sum: Duration,
    /// Buckets as (upper bound, samples that landed in this bucket).
    pub buckets: Vec<(Duration, u64)>,
    /// Samples beyond the last bound.
    pub overflow: u64,
}

impl TimerSnapshot {
    /// Mean sample duration, `None` when no samples were recorded.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        Some(self.sum / u32::try_from(self.count).unwrap_or(u32::MAX))
    }
}

/// Scoped duration recording: created by [`Timer::start`], records exactly
/// once on drop regardless of how the owning scope exits.
#[derive(Debug)]
pub struct TimerGuard {
    timer: Timer,
    started: Instant,
}

impl TimerGuard {
    /// Elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.timer.record(self.started.elapsed());
    }
}

/// Process-wide registry mapping name + tags to shared series.
///
/// The maps are locked only while registering or looking up a series;
/// all recording goes through the returned handles.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: RwLock<HashMap<SeriesKey, Counter>>,
    gauges: RwLock<HashMap<SeriesKey, Gauge>>,
    timers: RwLock<HashMap<SeriesKey, Timer>>,
}

impl MetricsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or look up) a counter series.
    #[must_use]
    pub fn counter(&self, name: &str, tags: &[(&str, &str)]) -> Counter {
        Self::series(&self.counters, name, tags)
    }

    /// Register (or look up) a gauge series.
    #[must_use]
    pub fn gauge(&self, name: &str, tags: &[(&str, &str)]) -> Gauge {
        Self::series(&self.gauges, name, tags)
    }

    /// Register (or look up) a timer series.
    #[must_use]
    pub fn timer(&self, name: &str, tags: &[(&str, &str)]) -> Timer {
        Self::series(&self.timers, name, tags)
    }

    fn series<T: Clone + Default>(
        map: &RwLock<HashMap<SeriesKey, T>>,
        name: &str,
        tags: &[(&str, &str)],
    ) -> T {
        let key = SeriesKey::new(name, tags);
        if let Some(existing) = lock_read(map).get(&key) {
            return existing.clone();
        }
        lock_write(map).entry(key).or_default().clone()
    }
}

// Registry maps hold only plain handles; a poisoned lock can only come from
// a panic in this module, and recovering the inner map is always safe.
fn lock_read<'a, T>(lock: &'a RwLock<T>) -> std::sync::RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn lock_write<'a, T>(lock: &'a RwLock<T>) -> std::sync::RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Recover a mutex guard even if a panicking holder poisoned it.
pub(crate) fn lock_mutex<'a, T>(lock: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counter_is_monotonic() {
        let registry = MetricsRegistry::new();
        let counter = registry.counter("api_requests_total", &[("service", "dispatcher")]);
        counter.increment();
        counter.add(4);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn test_same_name_and_tags_share_a_series() {
        let registry = MetricsRegistry::new();
        let a = registry.counter(
            "api_requests_total",
            &[("service", "dispatcher"), ("endpoint", "fast")],
        );
        // Tag order must not matter for identity.
        let b = registry.counter(
            "api_requests_total",
            &[("endpoint", "fast"), ("service", "dispatcher")],
        );
        a.increment();
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn test_different_tags_are_distinct_series() {
        let registry = MetricsRegistry::new();
        let a = registry.counter("api_requests_total", &[("service", "dispatcher")]);
        let b = registry.counter("api_requests_total", &[("service", "worker")]);
        a.increment();
        assert_eq!(b.get(), 0);
    }

    #[test]
    fn test_gauge_track_releases_on_drop() {
        let registry = MetricsRegistry::new();
        let gauge = registry.gauge("api_active_requests", &[]);
        {
            let _guard = gauge.track();
            assert_eq!(gauge.get(), 1);
        }
        assert_eq!(gauge.get(), 0);
    }

    #[test]
    fn test_gauge_never_goes_negative() {
        let gauge = Gauge::default();
        gauge.decrement();
        gauge.decrement();
        assert_eq!(gauge.get(), 0);
        gauge.set(-7);
        assert_eq!(gauge.get(), 0);
    }

    #[test]
    fn test_gauge_concurrent_guards_balance_out() {
        let gauge = Arc::new(Gauge::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gauge = Arc::clone(&gauge);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let _guard = gauge.track();
                        assert!(gauge.get() >= 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(gauge.get(), 0);
    }

    #[test]
    fn test_timer_count_sum_and_mean() {
        let registry = MetricsRegistry::new();
        let timer = registry.timer("api_request_duration_seconds", &[]);
        timer.record(Duration::from_millis(40));
        timer.record(Duration::from_millis(60));
        let snapshot = timer.snapshot();
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.sum, Duration::from_millis(100));
        assert_eq!(snapshot.mean(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_timer_distribution_buckets() {
        let timer = Timer::default();
        timer.record(Duration::from_millis(40)); // <= 50ms bound
        timer.record(Duration::from_secs(3)); // <= 5s bound
        timer.record(Duration::from_secs(60)); // beyond all bounds
        let snapshot = timer.snapshot();
        let in_buckets: u64 = snapshot.buckets.iter().map(|(_, n)| n).sum();
        assert_eq!(in_buckets, 2);
        assert_eq!(snapshot.overflow, 1);
        let (first_bound, first_count) = snapshot.buckets[0];
        assert_eq!(first_bound, Duration::from_millis(50));
        assert_eq!(first_count, 1);
    }

    #[test]
    fn test_timer_guard_records_on_drop() {
        let timer = Timer::default();
        {
            let _guard = timer.start();
        }
        assert_eq!(timer.count(), 1);
    }

    #[test]
    fn test_concurrent_counter_increments() {
        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let counter = registry.counter("worker_jobs_processed_total", &[]);
                    for _ in 0..1000 {
                        counter.increment();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let counter = registry.counter("worker_jobs_processed_total", &[]);
        assert_eq!(counter.get(), 8000);
    }
}
