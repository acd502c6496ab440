use std::collections::VecDeque;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crate::drivers::channel::Producer;
use crate::drivers::AcquisitionError;
/// Raw counts averaged during tare.
pub const TARE_READS: usize = 15;
/// Raw counts averaged per load-cell sample.
pub const READS_PER_SAMPLE: usize = 5;
/// ADS1115 programmable gain 4 (+/-1.024 V full scale).
pub const PRESSURE_ADC_GAIN: u8 = 4;
/// ADS1115 fastest conversion rate, samples per second.
pub const PRESSURE_ADC_DATA_RATE: u16 = 860;
/// Pause after a failed read before trying again.
const READ_RETRY_DELAY: Duration = Duration::from_millis(20);
/// Failed reads in a row after which the device is given up.
pub const MAX_CONSECUTIVE_READ_FAILURES: u32 = 50;
/// Anything that yields one sensor value per blocking call.
pub trait SensorSource: Send {
    fn name(&self) -> &str;
    fn read(&mut self) -> Result<f64, AcquisitionError>;
}
impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn read(&mut self) -> Result<f64, AcquisitionError> {
        (**self).read()
    }
}
/// Bit-level access to an HX711-style 24-bit load-cell amplifier.
pub trait LoadCellAmplifier: Send {
    fn reset(&mut self) -> Result<(), AcquisitionError>;
    /// One signed 24-bit conversion.
    fn read_raw(&mut self) -> Result<i32, AcquisitionError>;
}
/// Access to an ADS1115-style ADC wired differentially on P0/P1.
pub trait PressureAdc: Send {
    fn configure(&mut self, gain: u8, data_rate: u16) -> Result<(), AcquisitionError>;
    fn read_raw(&mut self) -> Result<i16, AcquisitionError>;
}
/// Load-cell channel: tared, averaged and divided by the reference unit.
pub struct LoadCellSource<A: LoadCellAmplifier> {
    amplifier: A,
    offset: f64,
    reference_unit: f64,
}
impl<A: LoadCellAmplifier> LoadCellSource<A> {
    /// Resets the amplifier and tares it. Any failure here is fatal to the channel.
    pub fn init(mut amplifier: A, reference_unit: f64) -> Result<Self, AcquisitionError> {
        log::info!("initializing start (load cell)");
        amplifier.reset()?;
        let offset = mean_of_reads(&mut amplifier, TARE_READS)
            .map_err(|e| AcquisitionError::init("load cell", format!("tare failed: {e}")))?;
        log::info!("initializing end   (load cell), tare offset {offset:.1}");
        Ok(Self {
            amplifier,
            offset,
            reference_unit,
        })
    }
    pub fn offset(&self) -> f64 {
        self.offset
    }
}
fn mean_of_reads<A: LoadCellAmplifier>(
    amplifier: &mut A,
    times: usize,
) -> Result<f64, AcquisitionError> {
    let mut sum = 0.0;
    for _ in 0..times {
        sum += f64::from(amplifier.read_raw()?);
    }
    Ok(sum / times as f64)
}
impl<A: LoadCellAmplifier> SensorSource for LoadCellSource<A> {
    fn name(&self) -> &str {
        "load cell"
    }
    fn read(&mut self) -> Result<f64, AcquisitionError> {
        let raw = mean_of_reads(&mut self.amplifier, READS_PER_SAMPLE)?;
        Ok((raw - self.offset) / self.reference_unit)
    }
}
/// Pressure channel: raw differential ADC counts.
pub struct PressureSource<D: PressureAdc> {
    adc: D,
}
impl<D: PressureAdc> PressureSource<D> {
    pub fn init(mut adc: D) -> Result<Self, AcquisitionError> {
        log::info!("initializing start (pressure adc)");
        adc.configure(PRESSURE_ADC_GAIN, PRESSURE_ADC_DATA_RATE)?;
        log::info!("initializing end   (pressure adc)");
        Ok(Self { adc })
    }
}
impl<D: PressureAdc> SensorSource for PressureSource<D> {
    fn name(&self) -> &str {
        "pressure"
    }
    fn read(&mut self) -> Result<f64, AcquisitionError> {
        Ok(f64::from(self.adc.read_raw()?))
    }
}
/// In-memory source useful for tests and deterministic playback.
pub struct ScriptedSource {
    name: String,
    values: VecDeque<f64>,
    pause: Duration,
}
impl ScriptedSource {
    pub fn new(name: &str, values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            name: name.to_owned(),
            values: values.into_iter().collect(),
            pause: Duration::ZERO,
        }
    }
    /// Sleeps this long before every read, like a converter would.
    pub fn paced(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}
impl SensorSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }
    fn read(&mut self) -> Result<f64, AcquisitionError> {
        if !self.pause.is_zero() {
            thread::sleep(self.pause);
        }
        self.values
            .pop_front()
            .ok_or_else(|| AcquisitionError::Exhausted(self.name.clone()))
    }
}
/// A running acquisition thread.
pub struct SourceHandle {
    name: String,
    thread: JoinHandle<()>,
}
impl SourceHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
    /// Waits up to `timeout` for the thread to drop its hardware handle.
    /// Returns false if it is still stuck inside a read.
    pub fn wait_released(self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.thread.is_finished() {
            if Instant::now() >= deadline {
                log::warn!("{} did not stop within {:?}, leaving it detached", self.name, timeout);
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if self.thread.join().is_err() {
            log::error!("{} acquisition thread panicked", self.name);
        }
        true
    }
}
/// Starts one acquisition activity.
///
/// `init` runs on the new thread so the hardware handle never leaves it. The
/// call returns only after `init` finished; its error aborts startup. After
/// that the thread reads and pushes forever, stalling while the queue is full,
/// and exits when the consumer is gone or the source runs dry.
pub fn spawn_source<S, F>(
    name: &str,
    init: F,
    samples: Producer<f64>,
) -> Result<SourceHandle, AcquisitionError>
where
    S: SensorSource + 'static,
    F: FnOnce() -> Result<S, AcquisitionError> + Send + 'static,
{
    let (ready_tx, ready_rx) = mpsc::channel();
    let thread_name = name.to_owned();
    let thread = thread::Builder::new()
        .name(format!("source-{name}"))
        .spawn(move || {
            let mut source = match init() {
                Ok(source) => {
                    ready_tx.send(Ok(())).ok();
                    source
                }
                Err(err) => {
                    ready_tx.send(Err(err)).ok();
                    return;
                }
            };
            log::info!("start reading {}", source.name());
            read_loop(&mut source, &samples);
            log::info!("{thread_name} stopped, releasing hardware");
        })
        .map_err(|e| AcquisitionError::init(name, e))?;
    match ready_rx.recv() {
        Ok(Ok(())) => Ok(SourceHandle {
            name: name.to_owned(),
            thread,
        }),
        Ok(Err(err)) => {
            thread.join().ok();
            Err(err)
        }
        Err(_) => {
            thread.join().ok();
            Err(AcquisitionError::InitAborted(name.to_owned()))
        }
    }
}
/// Reads and pushes until the consumer leaves, the source runs dry or the
/// device is gone. A single failed read only skips that sample.
fn read_loop<S: SensorSource>(source: &mut S, samples: &Producer<f64>) {
    let mut failures = 0;
    loop {
        match source.read() {
            Ok(value) => {
                failures = 0;
                if samples.push(value).is_err() {
                    return;
                }
            }
            Err(AcquisitionError::Exhausted(_)) => return,
            Err(err @ AcquisitionError::Closed(_)) => {
                log::error!("{err}, stopping acquisition");
                return;
            }
            Err(err) => {
                failures += 1;
                if failures >= MAX_CONSECUTIVE_READ_FAILURES {
                    log::error!("{}: {failures} reads failed in a row, giving up: {err}", source.name());
                    return;
                }
                log::warn!("skipping sample: {err}");
                thread::sleep(READ_RETRY_DELAY);
            }
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::channel::bounded;
    struct FakeAmplifier {
        counts: VecDeque<i32>,
    }
    impl LoadCellAmplifier for FakeAmplifier {
        fn reset(&mut self) -> Result<(), AcquisitionError> {
            Ok(())
        }
        fn read_raw(&mut self) -> Result<i32, AcquisitionError> {
            self.counts
                .pop_front()
                .ok_or_else(|| AcquisitionError::read("fake", "empty"))
        }
    }
    /// Replays a fixed list of read outcomes, then runs dry.
    struct FlakySource(VecDeque<Result<f64, AcquisitionError>>);
    impl SensorSource for FlakySource {
        fn name(&self) -> &str {
            "flaky"
        }
        fn read(&mut self) -> Result<f64, AcquisitionError> {
            self.0
                .pop_front()
                .unwrap_or_else(|| Err(AcquisitionError::Exhausted("flaky".into())))
        }
    }
    struct DeadSource;
    impl SensorSource for DeadSource {
        fn name(&self) -> &str {
            "dead"
        }
        fn read(&mut self) -> Result<f64, AcquisitionError> {
            Err(AcquisitionError::read("dead", "timeout"))
        }
    }
    struct BrokenAdc;
    impl PressureAdc for BrokenAdc {
        fn configure(&mut self, _gain: u8, _data_rate: u16) -> Result<(), AcquisitionError> {
            Err(AcquisitionError::init("pressure adc", "no ack on i2c"))
        }
        fn read_raw(&mut self) -> Result<i16, AcquisitionError> {
            Ok(0)
        }
    }
    #[test]
    fn load_cell_tares_then_averages() {
        let mut counts = vec![100; TARE_READS];
        counts.extend([110, 120, 130, 140, 150]);
        let amp = FakeAmplifier {
            counts: counts.into_iter().collect(),
        };
        let mut cell = LoadCellSource::init(amp, 2.0).unwrap();
        assert_eq!(cell.offset(), 100.0);
        assert_eq!(cell.read().unwrap(), 15.0);
    }
    #[test]
    fn tare_failure_is_an_init_error() {
        let amp = FakeAmplifier {
            counts: VecDeque::from(vec![1, 2]),
        };
        assert!(matches!(
            LoadCellSource::init(amp, 1.0),
            Err(AcquisitionError::Init { .. })
        ));
    }
    #[test]
    fn spawned_source_pushes_in_order_then_exits() {
        let (tx, mut rx) = bounded(16);
        let handle = spawn_source(
            "script",
            || Ok(ScriptedSource::new("script", [1.0, 2.0, 3.0])),
            tx,
        )
        .unwrap();
        assert!(handle.wait_released(Duration::from_secs(2)));
        assert_eq!(rx.drain(16), vec![1.0, 2.0, 3.0]);
    }
    #[test]
    fn failed_reads_are_skipped() {
        let (tx, mut rx) = bounded(16);
        let outcomes = VecDeque::from(vec![
            Ok(1.0),
            Err(AcquisitionError::read("flaky", "bad line 'x'")),
            Err(AcquisitionError::read("flaky", "timeout")),
            Ok(2.0),
        ]);
        let handle = spawn_source("flaky", move || Ok(FlakySource(outcomes)), tx).unwrap();
        assert!(handle.wait_released(Duration::from_secs(2)));
        assert_eq!(rx.drain(16), vec![1.0, 2.0]);
    }
    #[test]
    fn disconnected_device_ends_the_activity() {
        let (tx, mut rx) = bounded(16);
        let outcomes = VecDeque::from(vec![
            Ok(1.0),
            Err(AcquisitionError::Closed("flaky".into())),
            Ok(2.0),
        ]);
        let handle = spawn_source("flaky", move || Ok(FlakySource(outcomes)), tx).unwrap();
        assert!(handle.wait_released(Duration::from_secs(2)));
        assert_eq!(rx.drain(16), vec![1.0]);
    }
    #[test]
    fn endless_read_failures_end_the_activity() {
        // consumer stays alive: the thread has to give up on its own
        let (tx, _rx) = bounded::<f64>(4);
        let handle = spawn_source("dead", || Ok(DeadSource), tx).unwrap();
        assert!(handle.wait_released(Duration::from_secs(5)));
    }
    #[test]
    fn init_failure_aborts_before_reading() {
        let (tx, _rx) = bounded(4);
        let result = spawn_source("pressure", || PressureSource::init(BrokenAdc), tx);
        assert!(matches!(result, Err(AcquisitionError::Init { .. })));
    }
    #[test]
    fn producer_stalls_on_full_queue_and_stops_when_consumer_leaves() {
        let (tx, rx) = bounded(2);
        let handle = spawn_source(
            "endless",
            || Ok(ScriptedSource::new("endless", std::iter::repeat(1.0).take(10_000))),
            tx,
        )
        .unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        drop(rx);
        assert!(handle.wait_released(Duration::from_secs(2)));
    }
}
