use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
/// Single start instant shared by everything that stamps elapsed time.
#[derive(Clone, Copy, Debug)]
pub struct PipelineClock {
    start: Instant,
}
impl PipelineClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
    /// Seconds since the pipeline started.
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
/// Read-only view of the aggregator tick length.
///
/// The config owner holds the only writer; the aggregator gets a clone and
/// loads it once per tick. Stored as `f64` seconds bit-cast into an atomic.
#[derive(Clone, Debug)]
pub struct TickInterval {
    seconds_bits: Arc<AtomicU64>,
}
impl TickInterval {
    pub fn from_seconds(seconds: f64) -> Self {
        Self {
            seconds_bits: Arc::new(AtomicU64::new(seconds.to_bits())),
        }
    }
    pub fn seconds(&self) -> f64 {
        f64::from_bits(self.seconds_bits.load(Ordering::Acquire))
    }
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.seconds()).unwrap_or(Duration::ZERO)
    }
    pub(crate) fn store(&self, seconds: f64) {
        self.seconds_bits.store(seconds.to_bits(), Ordering::Release);
    }
}
/// Cooperative stop request, checked once per tick by the looping activities.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}
impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
/// Time left in the current period, or `None` when the work already overran it.
///
/// Overruns carry no debt into the next period: the caller just starts the
/// next iteration right away.
pub fn remaining_in_period(period: Duration, spent: Duration) -> Option<Duration> {
    period.checked_sub(spent).filter(|d| !d.is_zero())
}
/// Sleeps out the rest of the period that began at `iteration_start`.
/// Returns how long it slept.
pub fn sleep_until_next_period(iteration_start: Instant, period: Duration) -> Duration {
    match remaining_in_period(period, iteration_start.elapsed()) {
        Some(rest) => {
            thread::sleep(rest);
            rest
        }
        None => Duration::ZERO,
    }
}
