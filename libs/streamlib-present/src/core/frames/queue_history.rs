// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::VecDeque;

/// Rolling window of queue-depth samples, about half a second long.
///
/// Bounded: once full, each new sample evicts the oldest.
#[derive(Debug, Clone)]
pub struct QueueHistory {
    samples: VecDeque<usize>,
    capacity: usize,
}

impl QueueHistory {
    /// Window holding `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Window spanning half a second of samples taken at `rate_hz`.
    pub fn half_second(rate_hz: u32) -> Self {
        Self::new((rate_hz / 2) as usize)
    }

    pub fn record(&mut self, depth: usize) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(depth);
    }

    /// Any sample at or below `depth`.
    pub fn any_at_most(&self, depth: usize) -> bool {
        self.samples.iter().any(|&d| d <= depth)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_eviction() {
        let mut history = QueueHistory::new(3);
        for depth in [0, 2, 2, 2] {
            history.record(depth);
        }
        assert_eq!(history.len(), 3);
        // The 0 sample was evicted.
        assert!(!history.any_at_most(1));
        assert!(history.any_at_most(2));
    }

    #[test]
    fn test_half_second_window() {
        assert_eq!(QueueHistory::half_second(60).capacity(), 30);
        assert_eq!(QueueHistory::half_second(1).capacity(), 1);
    }

    #[test]
    fn test_empty_history_matches_nothing() {
        let history = QueueHistory::new(4);
        assert!(history.is_empty());
        assert!(!history.any_at_most(usize::MAX));
    }
}
