// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-engine fence timelines.
//!
//! Each GPU engine owns one monotonically increasing counter. [`FenceChannel`]
//! hands out a [`FenceTicket`] for every signal and only accepts waits on
//! tickets it issued, so no CPU or GPU wait can target a value the engine was
//! never told to reach.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::{Result, StreamError};

/// Independent GPU execution queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    VideoProcess,
    Graphics,
    Overlay,
    /// Vendor accelerator compute queue (AMF).
    Accelerator,
    /// The decoder's device context, for locked interop copies.
    Decoder,
}

impl Engine {
    pub fn name(&self) -> &'static str {
        match self {
            Self::VideoProcess => "video-process",
            Self::Graphics => "graphics",
            Self::Overlay => "overlay",
            Self::Accelerator => "accelerator",
            Self::Decoder => "decoder",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A device-side fence counter.
pub trait FenceTimeline: Send + Sync {
    /// Instruct the owning queue to reach `value` once prior work completes.
    fn signal(&self, value: u64) -> Result<()>;

    fn completed_value(&self) -> u64;

    /// Block the CPU until `value` is reached. Returns `false` on timeout.
    fn wait_completed(&self, value: u64, timeout: Duration) -> Result<bool>;

    /// Make `waiter` wait for `value` before running further work.
    fn queue_wait(&self, waiter: Engine, value: u64) -> Result<()>;
}

/// A signalled point on an engine's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceTicket {
    engine: Engine,
    value: u64,
}

impl FenceTicket {
    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

pub struct FenceChannel {
    engine: Engine,
    timeline: Arc<dyn FenceTimeline>,
    last_signaled: u64,
    cpu_timeout: Duration,
}

impl FenceChannel {
    pub const DEFAULT_CPU_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn new(engine: Engine, timeline: Arc<dyn FenceTimeline>) -> Self {
        let last_signaled = timeline.completed_value();
        Self {
            engine,
            timeline,
            last_signaled,
            cpu_timeout: Self::DEFAULT_CPU_TIMEOUT,
        }
    }

    pub fn with_cpu_timeout(mut self, timeout: Duration) -> Self {
        self.cpu_timeout = timeout;
        self
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn last_signaled(&self) -> u64 {
        self.last_signaled
    }

    /// Increment the counter and signal it on the engine.
    pub fn signal(&mut self) -> Result<FenceTicket> {
        let value = self.last_signaled + 1;
        self.timeline.signal(value)?;
        self.last_signaled = value;
        Ok(FenceTicket {
            engine: self.engine,
            value,
        })
    }

    fn check(&self, ticket: FenceTicket) -> Result<()> {
        if ticket.engine != self.engine {
            return Err(StreamError::Fence(format!(
                "ticket for {} used on the {} fence",
                ticket.engine, self.engine
            )));
        }
        if ticket.value > self.last_signaled {
            return Err(StreamError::Fence(format!(
                "{} fence value {} was never signalled (last {})",
                self.engine, ticket.value, self.last_signaled
            )));
        }
        Ok(())
    }

    pub fn is_complete(&self, ticket: FenceTicket) -> bool {
        self.timeline.completed_value() >= ticket.value
    }

    /// Block until the ticket completes.
    pub fn wait_cpu(&self, ticket: FenceTicket) -> Result<()> {
        self.check(ticket)?;
        if self.is_complete(ticket) {
            return Ok(());
        }
        if self.timeline.wait_completed(ticket.value, self.cpu_timeout)? {
            Ok(())
        } else {
            Err(StreamError::Fence(format!(
                "{} fence value {} not reached within {:?}",
                self.engine, ticket.value, self.cpu_timeout
            )))
        }
    }

    /// Queue a wait on `waiter` without blocking the CPU.
    pub fn wait_gpu(&self, waiter: Engine, ticket: FenceTicket) -> Result<()> {
        self.check(ticket)?;
        if waiter == self.engine || self.is_complete(ticket) {
            return Ok(());
        }
        self.timeline.queue_wait(waiter, ticket.value)
    }
}

impl std::fmt::Debug for FenceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FenceChannel")
            .field("engine", &self.engine)
            .field("last_signaled", &self.last_signaled)
            .field("completed", &self.timeline.completed_value())
            .finish()
    }
}

/// CPU timeline used by the software device.
///
/// Signals complete immediately unless the timeline is held, in which case
/// they complete on [`release`](Self::release).
#[derive(Default)]
pub struct SoftwareTimeline {
    state: Mutex<TimelineState>,
    reached: Condvar,
}

#[derive(Default)]
struct TimelineState {
    completed: u64,
    pending: u64,
    held: bool,
    queued_waits: Vec<(Engine, u64)>,
}

impl SoftwareTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop completing signals until [`release`](Self::release).
    pub fn hold(&self) {
        self.state.lock().held = true;
    }

    /// Complete everything signalled so far and resume auto-completion.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.held = false;
        state.completed = state.completed.max(state.pending);
        self.reached.notify_all();
    }

    /// Cross-engine waits queued against this timeline.
    pub fn queued_waits(&self) -> Vec<(Engine, u64)> {
        self.state.lock().queued_waits.clone()
    }
}

impl FenceTimeline for SoftwareTimeline {
    fn signal(&self, value: u64) -> Result<()> {
        let mut state = self.state.lock();
        state.pending = state.pending.max(value);
        if !state.held {
            state.completed = state.pending;
            self.reached.notify_all();
        }
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        self.state.lock().completed
    }

    fn wait_completed(&self, value: u64, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.completed < value {
            if self.reached.wait_until(&mut state, deadline).timed_out() {
                return Ok(state.completed >= value);
            }
        }
        Ok(true)
    }

    fn queue_wait(&self, waiter: Engine, value: u64) -> Result<()> {
        self.state.lock().queued_waits.push((waiter, value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(engine: Engine) -> (FenceChannel, Arc<SoftwareTimeline>) {
        let timeline = Arc::new(SoftwareTimeline::new());
        (
            FenceChannel::new(engine, Arc::clone(&timeline) as Arc<dyn FenceTimeline>),
            timeline,
        )
    }

    #[test]
    fn test_tickets_are_keyed_by_engine_and_value() {
        let (mut graphics, _) = channel(Engine::Graphics);
        let (mut video, _) = channel(Engine::VideoProcess);
        let g = graphics.signal().unwrap();
        let v = video.signal().unwrap();
        assert_eq!(g.value(), v.value());
        assert_ne!(g, v);

        let tickets: std::collections::HashSet<FenceTicket> = [g, v, g].into_iter().collect();
        assert_eq!(tickets.len(), 2);
    }

    #[test]
    fn test_signal_is_monotonic() {
        let (mut fence, _) = channel(Engine::Graphics);
        let a = fence.signal().unwrap();
        let b = fence.signal().unwrap();
        assert!(b.value() > a.value());
        assert_eq!(fence.last_signaled(), b.value());
        fence.wait_cpu(b).unwrap();
    }

    #[test]
    fn test_rejects_unsignalled_and_foreign_tickets() {
        let (mut gfx, _) = channel(Engine::Graphics);
        let (mut vp, _) = channel(Engine::VideoProcess);
        let vp_ticket = vp.signal().unwrap();
        gfx.signal().unwrap();

        assert!(matches!(gfx.wait_cpu(vp_ticket), Err(StreamError::Fence(_))));

        let future = FenceTicket {
            engine: Engine::Graphics,
            value: 99,
        };
        assert!(matches!(gfx.wait_cpu(future), Err(StreamError::Fence(_))));
        assert!(gfx.wait_gpu(Engine::Overlay, future).is_err());
    }

    #[test]
    fn test_held_timeline_times_out_then_completes() {
        let (fence, timeline) = channel(Engine::VideoProcess);
        let mut fence = fence.with_cpu_timeout(Duration::from_millis(20));
        timeline.hold();
        let ticket = fence.signal().unwrap();
        assert!(!fence.is_complete(ticket));
        assert!(fence.wait_cpu(ticket).is_err());

        fence.wait_gpu(Engine::Graphics, ticket).unwrap();
        assert_eq!(timeline.queued_waits(), vec![(Engine::Graphics, ticket.value())]);

        timeline.release();
        assert!(fence.is_complete(ticket));
        fence.wait_cpu(ticket).unwrap();
    }

    #[test]
    fn test_release_wakes_blocked_waiter() {
        let (fence, timeline) = channel(Engine::Accelerator);
        let mut fence = fence.with_cpu_timeout(Duration::from_secs(5));
        timeline.hold();
        let ticket = fence.signal().unwrap();

        let releaser = Arc::clone(&timeline);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            releaser.release();
        });
        fence.wait_cpu(ticket).unwrap();
        handle.join().unwrap();
    }
}
