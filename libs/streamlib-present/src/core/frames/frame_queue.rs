// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::VecDeque;

use super::Frame;

/// FIFO of owned frames.
///
/// Capacity is not enforced here; the pacer's drop policy decides how deep a
/// queue may grow. Removal is always from the front so that whatever remains
/// is a contiguous suffix of the arrival order.
#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: VecDeque<Frame>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::with_capacity(4),
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    /// Remove the oldest frame.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn front(&self) -> Option<&Frame> {
        self.frames.front()
    }

    /// Sequence numbers, oldest first.
    pub fn sequences(&self) -> Vec<u64> {
        self.frames.iter().map(Frame::sequence).collect()
    }

    /// Take every queued frame, oldest first.
    pub fn drain(&mut self) -> Vec<Frame> {
        self.frames.drain(..).collect()
    }
}
