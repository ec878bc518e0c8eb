// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::VecDeque;

/// Keeps the last rendered frames alive until the GPU is done reading them.
///
/// Holds the frame just rendered. Retiring the next one returns the previous
/// frame to the caller, who releases it back to the decoder.
#[derive(Debug)]
pub struct DeferredFreeRing<T> {
    slots: VecDeque<T>,
    depth: usize,
}

impl<T> DeferredFreeRing<T> {
    pub const DEFAULT_DEPTH: usize = 1;

    pub fn new() -> Self {
        Self::with_depth(Self::DEFAULT_DEPTH)
    }

    pub fn with_depth(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            slots: VecDeque::with_capacity(depth + 1),
            depth,
        }
    }

    /// Retain `item`, returning the oldest retained item once the ring is full.
    #[must_use = "the evicted item should be released"]
    pub fn retire(&mut self, item: T) -> Option<T> {
        self.slots.push_back(item);
        if self.slots.len() > self.depth {
            self.slots.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn drain(&mut self) -> Vec<T> {
        self.slots.drain(..).collect()
    }
}

impl<T> Default for DeferredFreeRing<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releases_previous_frame() {
        let mut ring = DeferredFreeRing::new();
        assert_eq!(ring.retire(1), None);
        assert_eq!(ring.retire(2), Some(1));
        assert_eq!(ring.retire(3), Some(2));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_deeper_ring_lags_further() {
        let mut ring = DeferredFreeRing::with_depth(2);
        assert_eq!(ring.retire(1), None);
        assert_eq!(ring.retire(2), None);
        assert_eq!(ring.retire(3), Some(1));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_drain_returns_everything_oldest_first() {
        let mut ring = DeferredFreeRing::new();
        let _ = ring.retire("a");
        assert_eq!(ring.retire("b"), Some("a"));
        assert_eq!(ring.drain(), vec!["b"]);
        assert!(ring.is_empty());
    }
}
