use std::collections::VecDeque;
use crate::drivers::config::ChannelConfig;
/// One display point: elapsed seconds and the raw (unscaled) channel value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedValue {
    pub time: f64,
    pub raw: f64,
}
/// Rolling history for one channel.
///
/// Holds at most `capacity` points; pushing onto a full buffer evicts the
/// oldest one. Raw values are kept as read, scaling happens on the way out.
pub struct RollingBuffer {
    points: VecDeque<TimedValue>,
    capacity: usize,
}
impl RollingBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    pub fn push(&mut self, time: f64, raw: f64) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(TimedValue { time, raw });
    }
    /// Changes the capacity, keeping the newest points that still fit.
    pub fn resize(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        while self.points.len() > capacity {
            self.points.pop_front();
        }
        self.capacity = capacity;
    }
    pub fn iter(&self) -> impl Iterator<Item = &TimedValue> {
        self.points.iter()
    }
    pub fn first_time(&self) -> Option<f64> {
        self.points.front().map(|p| p.time)
    }
    pub fn last_time(&self) -> Option<f64> {
        self.points.back().map(|p| p.time)
    }
    /// `[time, raw * gain + intercept]` pairs, oldest first, ready to plot.
    pub fn scaled_series(&self, channel: &ChannelConfig) -> Vec<[f64; 2]> {
        self.points
            .iter()
            .map(|p| [p.time, channel.scale(p.raw)])
            .collect()
    }
}
