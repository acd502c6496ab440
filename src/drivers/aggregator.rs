use std::time::Instant;
use crate::drivers::channel::{Consumer, Disconnected, Producer};
use crate::drivers::clock::{sleep_until_next_period, PipelineClock, StopSignal, TickInterval};
use crate::types::{AggregateRecord, CHANNEL_COUNT};
/// Mean of one tick's batch, or `previous` when the batch is empty.
pub fn reduce_batch(batch: &[f64], previous: f64) -> f64 {
    if batch.is_empty() {
        previous
    } else {
        batch.iter().sum::<f64>() / batch.len() as f64
    }
}
/// Turns bursts of raw samples into one record per tick.
///
/// Both raw queues are drained independently every tick, at most
/// `max_batch` samples each, without waiting. A channel that delivered
/// nothing repeats its previous mean; before its first sample that is 0.0.
pub struct Aggregator {
    raw: [Consumer<f64>; CHANNEL_COUNT],
    records: Producer<AggregateRecord>,
    clock: PipelineClock,
    interval: TickInterval,
    max_batch: usize,
    last_means: [f64; CHANNEL_COUNT],
    reported_gone: [bool; CHANNEL_COUNT],
}
impl Aggregator {
    pub fn new(
        raw: [Consumer<f64>; CHANNEL_COUNT],
        records: Producer<AggregateRecord>,
        clock: PipelineClock,
        interval: TickInterval,
    ) -> Self {
        let max_batch = raw[0].capacity();
        Self {
            raw,
            records,
            clock,
            interval,
            max_batch,
            last_means: [0.0; CHANNEL_COUNT],
            reported_gone: [false; CHANNEL_COUNT],
        }
    }
    /// Overrides R, the per-tick drain limit.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }
    /// Drains, reduces and stamps one record without publishing it.
    pub fn collect(&mut self) -> AggregateRecord {
        for (ch, queue) in self.raw.iter_mut().enumerate() {
            let batch = queue.drain(self.max_batch);
            log::trace!("ch{ch}: {} samples this tick", batch.len());
            self.last_means[ch] = reduce_batch(&batch, self.last_means[ch]);
            if queue.is_disconnected() && !self.reported_gone[ch] {
                self.reported_gone[ch] = true;
                log::warn!("ch{ch} producer is gone, holding {}", self.last_means[ch]);
            }
        }
        AggregateRecord {
            elapsed: self.clock.elapsed(),
            means: self.last_means,
        }
    }
    /// One full tick body. Blocks while the display side is full.
    pub fn tick(&mut self) -> Result<AggregateRecord, Disconnected> {
        let record = self.collect();
        self.records.push(record)?;
        Ok(record)
    }
    /// Ticks until asked to stop or until nobody reads the records anymore.
    /// Dropping `self` at the end hangs up the raw queues, which ends the
    /// sensor threads at their next push.
    pub fn run(mut self, stop: StopSignal) {
        log::info!("aggregator running at {:.3}s per tick", self.interval.seconds());
        while !stop.is_requested() {
            let tick_start = Instant::now();
            if self.tick().is_err() {
                log::info!("record consumer gone, aggregator exiting");
                break;
            }
            sleep_until_next_period(tick_start, self.interval.duration());
        }
        log::info!("aggregator stopped");
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::channel::bounded;
    use std::thread;
    use std::time::Duration;
    struct Rig {
        raw_tx: [Producer<f64>; CHANNEL_COUNT],
        records_rx: Consumer<AggregateRecord>,
        aggregator: Aggregator,
    }
    fn rig(capacity: usize) -> Rig {
        let (tx0, rx0) = bounded(capacity);
        let (tx1, rx1) = bounded(capacity);
        let (rec_tx, rec_rx) = bounded(16);
        let aggregator = Aggregator::new(
            [rx0, rx1],
            rec_tx,
            PipelineClock::start(),
            TickInterval::from_seconds(0.01),
        );
        Rig {
            raw_tx: [tx0, tx1],
            records_rx: rec_rx,
            aggregator,
        }
    }
    #[test]
    fn mean_of_batch() {
        assert_eq!(reduce_batch(&[10.0, 20.0, 30.0], 99.0), 20.0);
        assert!((reduce_batch(&[0.1, 0.2, 0.4], 0.0) - 0.7 / 3.0).abs() < 1e-12);
    }
    #[test]
    fn tick_publishes_mean_per_channel() {
        let mut rig = rig(100);
        for v in [10.0, 20.0, 30.0] {
            rig.raw_tx[0].push(v).unwrap();
        }
        rig.raw_tx[1].push(-4.0).unwrap();
        let record = rig.aggregator.tick().unwrap();
        assert_eq!(record.means, [20.0, -4.0]);
        assert_eq!(rig.records_rx.try_pop().unwrap(), Some(record));
    }
    #[test]
    fn empty_batch_carries_forward_previous_mean() {
        let mut rig = rig(100);
        // nothing ever arrived: boundary value
        assert_eq!(rig.aggregator.tick().unwrap().means, [0.0, 0.0]);
        rig.raw_tx[0].push(5.0).unwrap();
        rig.raw_tx[0].push(7.0).unwrap();
        rig.raw_tx[1].push(3.0).unwrap();
        assert_eq!(rig.aggregator.tick().unwrap().means, [6.0, 3.0]);
        rig.raw_tx[1].push(9.0).unwrap();
        assert_eq!(rig.aggregator.tick().unwrap().means, [6.0, 9.0]);
        assert_eq!(rig.aggregator.tick().unwrap().means, [6.0, 9.0]);
    }
    #[test]
    fn drains_at_most_r_samples_per_tick() {
        let mut rig = rig(8);
        rig.aggregator = rig.aggregator.with_max_batch(4);
        for v in 1..=8 {
            rig.raw_tx[0].push(v as f64).unwrap();
        }
        assert_eq!(rig.aggregator.tick().unwrap().means[0], 2.5);
        assert_eq!(rig.aggregator.tick().unwrap().means[0], 6.5);
    }
    #[test]
    fn elapsed_time_is_monotonic() {
        let mut rig = rig(4);
        let first = rig.aggregator.tick().unwrap().elapsed;
        thread::sleep(Duration::from_millis(5));
        let second = rig.aggregator.tick().unwrap().elapsed;
        assert!(second > first);
    }
    #[test]
    fn departed_producer_counts_as_empty() {
        let rig = rig(4);
        rig.raw_tx[1].push(2.0).unwrap();
        let Rig {
            raw_tx: [tx0, tx1],
            mut records_rx,
            mut aggregator,
        } = rig;
        drop(tx1);
        tx0.push(1.0).unwrap();
        assert_eq!(aggregator.tick().unwrap().means, [1.0, 2.0]);
        assert_eq!(aggregator.tick().unwrap().means, [1.0, 2.0]);
        assert_eq!(records_rx.drain(4).len(), 2);
    }
    #[test]
    fn run_stops_on_signal_and_releases_raw_queues() {
        let rig = rig(4);
        let stop = StopSignal::new();
        let worker = {
            let stop = stop.clone();
            let aggregator = rig.aggregator;
            thread::spawn(move || aggregator.run(stop))
        };
        let mut records_rx = rig.records_rx;
        thread::sleep(Duration::from_millis(50));
        stop.request();
        // keep room in the record queue so a tick can't block the stop check
        records_rx.drain(16);
        worker.join().unwrap();
        assert!(rig.raw_tx[0].push(1.0).is_err());
    }
    #[test]
    fn run_exits_when_records_consumer_is_dropped() {
        let rig = rig(4);
        drop(rig.records_rx);
        let worker = thread::spawn(move || rig.aggregator.run(StopSignal::new()));
        worker.join().unwrap();
    }
}
