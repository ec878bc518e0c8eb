// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Enqueue drop policy and overload relaxation.
//!
//! ## States
//!
//! ```text
//!            overflow streak >= threshold
//!            or decoder backlog streak
//!   Normal ──────────────────────────────▶ Relaxed
//!     ▲                                      │
//!     └──────── frames_remaining == 0 ───────┘
//! ```
//!
//! In `Normal` a queue holds at most the mode's base capacity. In `Relaxed`
//! (non-balanced modes only) it may hold one extra frame, capped at the
//! balanced capacity, for a fixed number of accepted submissions. Both streak
//! counters reset when the relaxed window expires.
//!
//! All state lives in [`RelaxationState`], mutated under the pacer's queue lock.

use crate::core::config::{PacingMode, RelaxationConfig};
use crate::core::frames::{Frame, FrameQueue};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaxationState {
    pub active: bool,
    pub frames_remaining: u32,
    pub overflow_streak: u32,
    pub healthy_streak: u32,
    pub backlog_streak: u32,
}

/// Outcome of making room for one enqueue.
#[derive(Debug, Default)]
pub struct EnqueueDrops {
    /// Frames removed from the front, oldest first. Free them after unlocking.
    pub dropped: Vec<Frame>,
    /// This enqueue pushed the state into `Relaxed`.
    pub relaxation_activated: bool,
}

#[derive(Debug, Clone)]
pub struct DropPolicy {
    mode: PacingMode,
    config: RelaxationConfig,
}

impl DropPolicy {
    pub fn new(mode: PacingMode, config: RelaxationConfig) -> Self {
        Self { mode, config }
    }

    pub fn mode(&self) -> PacingMode {
        self.mode
    }

    pub fn base_capacity(&self) -> usize {
        self.mode.max_queued_frames()
    }

    /// Capacity a queue may fill to before the next enqueue drops.
    pub fn effective_capacity(&self, state: &RelaxationState) -> usize {
        let base = self.base_capacity();
        if state.active && self.mode != PacingMode::Balanced {
            PacingMode::Balanced.max_queued_frames().min(base + 1)
        } else {
            base
        }
    }

    fn activate(&self, state: &mut RelaxationState, cause: &str) {
        let duration = self.config.duration_for(self.mode);
        state.active = true;
        state.frames_remaining = state.frames_remaining.max(duration);
        tracing::info!(
            "Pacer: relaxing {} queue capacity to {} for {} frames ({})",
            self.mode,
            self.effective_capacity(state),
            state.frames_remaining,
            cause
        );
    }

    /// Count down the relaxed window on an accepted submission.
    ///
    /// Returns `true` when this submission ended the window.
    pub fn on_submission(&self, state: &mut RelaxationState) -> bool {
        if !state.active {
            return false;
        }

        state.frames_remaining = state.frames_remaining.saturating_sub(1);
        if state.frames_remaining > 0 {
            return false;
        }

        state.active = false;
        state.overflow_streak = 0;
        state.healthy_streak = 0;
        tracing::info!(
            "Pacer: relaxation expired, {} queue capacity back to {}",
            self.mode,
            self.base_capacity()
        );
        true
    }

    /// Drop from the front of `queue` until one more frame fits.
    ///
    /// The capacity used is the one in force when the call starts; activating
    /// relaxation here only widens the next enqueue.
    pub fn make_room(&self, state: &mut RelaxationState, queue: &mut FrameQueue) -> EnqueueDrops {
        let capacity = self.effective_capacity(state);
        let mut drops = EnqueueDrops::default();

        if queue.len() < capacity {
            state.healthy_streak = state.healthy_streak.saturating_add(1);
            if state.healthy_streak >= self.config.healthy_reset_frames {
                state.overflow_streak = 0;
            }
            return drops;
        }

        state.overflow_streak = state.overflow_streak.saturating_add(1);
        state.healthy_streak = 0;

        if !state.active
            && self.mode != PacingMode::Balanced
            && state.overflow_streak >= self.config.overflow_threshold_for(self.mode)
        {
            self.activate(state, "sustained queue overflow");
            drops.relaxation_activated = true;
        }

        while queue.len() >= capacity {
            match queue.pop() {
                Some(frame) => drops.dropped.push(frame),
                None => break,
            }
        }

        drops
    }

    /// Account one decoder backlog report.
    ///
    /// Returns `true` when the report activated relaxation.
    pub fn on_decoder_backlog(&self, state: &mut RelaxationState, depth: u32) -> bool {
        if self.mode == PacingMode::Balanced {
            return false;
        }

        if depth >= self.config.decoder_backlog_threshold {
            state.backlog_streak = state.backlog_streak.saturating_add(1);
        } else {
            state.backlog_streak = 0;
        }

        if !state.active && state.backlog_streak >= self.config.decoder_backlog_streak {
            self.activate(state, "sustained decoder backlog");
            state.backlog_streak = 0;
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::{FrameBacking, FrameDescriptor, PixelFormat};

    fn frame(seq: u64) -> Frame {
        Frame::new(
            seq,
            FrameDescriptor::new(64, 64, PixelFormat::Nv12),
            FrameBacking::Cpu,
        )
    }

    fn policy(mode: PacingMode) -> DropPolicy {
        DropPolicy::new(mode, RelaxationConfig::default())
    }

    /// Submit like the vsync path does: count down, make room, enqueue.
    fn submit(
        policy: &DropPolicy,
        state: &mut RelaxationState,
        queue: &mut FrameQueue,
        seq: u64,
    ) -> usize {
        policy.on_submission(state);
        let drops = policy.make_room(state, queue);
        queue.push(frame(seq));
        drops.dropped.len()
    }

    #[test]
    fn test_drops_oldest_and_keeps_suffix() {
        let policy = policy(PacingMode::Balanced);
        let mut state = RelaxationState::default();
        let mut queue = FrameQueue::new();

        let mut dropped = 0;
        for seq in 0..10 {
            dropped += submit(&policy, &mut state, &mut queue, seq);
            assert!(queue.len() <= policy.effective_capacity(&state));
        }

        assert_eq!(dropped, 7);
        assert_eq!(queue.sequences(), vec![7, 8, 9]);
    }

    #[test]
    fn test_balanced_never_relaxes() {
        let policy = policy(PacingMode::Balanced);
        let mut state = RelaxationState::default();
        let mut queue = FrameQueue::new();
        for seq in 0..500 {
            submit(&policy, &mut state, &mut queue, seq);
        }
        assert!(!state.active);
        assert!(!policy.on_decoder_backlog(&mut state, 100));
    }

    #[test]
    fn test_low_latency_relaxes_on_24th_overflow_and_expires_after_180() {
        let policy = policy(PacingMode::LowLatency);
        let mut state = RelaxationState::default();
        let mut queue = FrameQueue::new();

        // Fill to capacity without overflowing.
        submit(&policy, &mut state, &mut queue, 0);
        submit(&policy, &mut state, &mut queue, 1);
        assert_eq!(state.overflow_streak, 0);

        let mut seq = 2;
        for overflow in 1..=24 {
            let drops = {
                policy.on_submission(&mut state);
                let drops = policy.make_room(&mut state, &mut queue);
                queue.push(frame(seq));
                drops
            };
            seq += 1;
            assert_eq!(drops.relaxation_activated, overflow == 24);
        }
        assert!(state.active);
        assert_eq!(state.frames_remaining, 180);
        assert_eq!(policy.effective_capacity(&state), 3);

        for accepted in 1..=180u32 {
            let ended = policy.on_submission(&mut state);
            assert_eq!(ended, accepted == 180, "accepted {}", accepted);
            if ended {
                assert!(!state.active);
                assert_eq!(state.overflow_streak, 0);
                assert_eq!(state.healthy_streak, 0);
            }
            policy.make_room(&mut state, &mut queue);
            queue.push(frame(seq));
            seq += 1;
        }
        assert!(!state.active);
        assert_eq!(policy.effective_capacity(&state), 2);
        assert!(queue.len() <= 2);
    }

    #[test]
    fn test_ultra_low_relaxes_after_eight_overflows() {
        let policy = policy(PacingMode::UltraLowLatency);
        let mut state = RelaxationState::default();
        let mut queue = FrameQueue::new();

        submit(&policy, &mut state, &mut queue, 0);
        for seq in 1..=8 {
            assert!(!state.active);
            submit(&policy, &mut state, &mut queue, seq);
        }
        assert!(state.active);
        assert_eq!(state.frames_remaining, 300);
        assert_eq!(policy.effective_capacity(&state), 2);
    }

    #[test]
    fn test_healthy_streak_clears_overflow_streak() {
        let policy = policy(PacingMode::LowLatency);
        let mut state = RelaxationState {
            overflow_streak: 20,
            ..Default::default()
        };
        let mut queue = FrameQueue::new();
        for _ in 0..119 {
            policy.make_room(&mut state, &mut queue);
        }
        assert_eq!(state.overflow_streak, 20);
        policy.make_room(&mut state, &mut queue);
        assert_eq!(state.overflow_streak, 0);
    }

    #[test]
    fn test_decoder_backlog_streak() {
        let policy = policy(PacingMode::LowLatency);
        let mut state = RelaxationState::default();

        for _ in 0..7 {
            assert!(!policy.on_decoder_backlog(&mut state, 12));
        }
        // A healthy report breaks the streak.
        assert!(!policy.on_decoder_backlog(&mut state, 3));
        assert_eq!(state.backlog_streak, 0);

        for report in 1..=8 {
            let activated = policy.on_decoder_backlog(&mut state, 10);
            assert_eq!(activated, report == 8);
        }
        assert!(state.active);
        assert_eq!(state.frames_remaining, 180);
        assert_eq!(state.backlog_streak, 0);
    }

    #[test]
    fn test_backlog_extends_but_never_shortens_window() {
        let policy = policy(PacingMode::LowLatency);
        let mut state = RelaxationState {
            frames_remaining: 250,
            backlog_streak: 7,
            ..Default::default()
        };
        assert!(policy.on_decoder_backlog(&mut state, 40));
        assert_eq!(state.frames_remaining, 250);
    }
}
