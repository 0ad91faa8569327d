//! Bounded FIFO of recent rate values used for charting

use std::collections::VecDeque;

/// Fixed-capacity rate history; the oldest value is evicted once full
#[derive(Debug, Clone)]
pub struct RollingHistory {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingHistory {
    /// Create an empty history. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, evicting the oldest when at capacity
    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest value still held
    pub fn first(&self) -> Option<f64> {
        self.values.front().copied()
    }

    /// Most recent value
    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Values oldest first, as one contiguous slice for chart sinks
    pub fn series(&mut self) -> &[f64] {
        self.values.make_contiguous()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}
