use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
/// Capacity of each raw sample queue between a sensor and the aggregator.
pub const RAW_CHANNEL_CAPACITY: usize = 100;
/// The consumer side hung up; nothing pushed from now on will ever be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;
/// Creates a fixed-capacity FIFO with exactly one producer and one consumer.
///
/// `push` blocks while the queue is full. That stall is the only flow control
/// in the pipeline: a slow consumer slows its producer down instead of letting
/// memory grow.
pub fn bounded<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (
        Producer { tx },
        Consumer {
            rx,
            capacity: capacity.max(1),
            hung_up: false,
        },
    )
}
pub struct Producer<T> {
    tx: SyncSender<T>,
}
impl<T> Producer<T> {
    /// Blocks until there is room. Fails only once the consumer is dropped.
    pub fn push(&self, item: T) -> Result<(), Disconnected> {
        self.tx.send(item).map_err(|_| Disconnected)
    }
}
pub struct Consumer<T> {
    rx: Receiver<T>,
    capacity: usize,
    hung_up: bool,
}
impl<T> Consumer<T> {
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// Non-blocking pop. `Ok(None)` means the queue is empty right now.
    pub fn try_pop(&mut self) -> Result<Option<T>, Disconnected> {
        match self.rx.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                self.hung_up = true;
                Err(Disconnected)
            }
        }
    }
    /// Takes whatever is queued, at most `max` items, without waiting for more.
    ///
    /// Items already queued before the producer went away are still returned;
    /// the disconnect shows up through [`Consumer::is_disconnected`] afterwards.
    pub fn drain(&mut self, max: usize) -> Vec<T> {
        let mut batch = Vec::new();
        while batch.len() < max {
            match self.try_pop() {
                Ok(Some(item)) => batch.push(item),
                Ok(None) | Err(Disconnected) => break,
            }
        }
        batch
    }
    /// True once a pop has observed that the producer is gone and the queue is empty.
    pub fn is_disconnected(&self) -> bool {
        self.hung_up
    }
}
