// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Queue state machine shared by the decoder, vsync, and render threads.
//!
//! ## Queues
//!
//! ```text
//!  submit_frame ──▶ pacing queue ──(vsync tick)──▶ render queue ──▶ renderer
//!        │                                              ▲
//!        └──────────── pacing disabled ─────────────────┘
//! ```
//!
//! Both queues and every counter sit behind one mutex. Frames leaving the
//! queues are always released with that mutex unlocked, since releasing may
//! return a surface to the decoder.
//!
//! [`PacerCore`] owns no threads. [`Pacer`](super::Pacer) drives it from
//! dedicated threads; tests drive it step by step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::deferred_free::DeferredFreeRing;
use super::drop_policy::{DropPolicy, EnqueueDrops, RelaxationState};
use super::stats::PacerStats;
use crate::core::config::PacerConfig;
use crate::core::events::{EventSink, PresentEvent};
use crate::core::frames::{Frame, FrameQueue, QueueHistory};
use crate::core::renderer::{Renderer, RendererAttributes};
use crate::core::vsync::VsyncListener;

/// What one vsync tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VsyncOutcome {
    /// A frame moved to the render queue.
    Released,
    /// No frame arrived before the next vsync was due.
    NoFrame,
    Stopping,
}

struct PacerState {
    pacing_queue: FrameQueue,
    render_queue: FrameQueue,
    pacing_history: QueueHistory,
    render_history: QueueHistory,
    relaxation: RelaxationState,
    stats: PacerStats,
    vsync_pending: bool,
    stopping: bool,
}

impl PacerState {
    fn account(&mut self, drops: &EnqueueDrops) {
        self.stats.dropped_frames += drops.dropped.len() as u64;
        if drops.relaxation_activated {
            self.stats.relaxation_activations += 1;
        }
    }
}

struct RenderContext {
    renderer: Box<dyn Renderer>,
    deferred: DeferredFreeRing<Frame>,
}

pub struct PacerCore {
    state: Mutex<PacerState>,
    pacing_not_empty: Condvar,
    render_not_empty: Condvar,
    vsync_signalled: Condvar,
    render: Mutex<RenderContext>,
    policy: DropPolicy,
    config: PacerConfig,
    display_fps: u32,
    vsync_paced: AtomicBool,
    render_on_thread: bool,
    no_buffering: bool,
    events: Option<EventSink>,
}

impl PacerCore {
    /// Build the queue state for `renderer`.
    ///
    /// Frames are vsync paced when pacing is enabled in `config` or the
    /// renderer demands it with [`RendererAttributes::FORCE_PACING`].
    pub fn new(
        config: PacerConfig,
        display_fps: u32,
        renderer: Box<dyn Renderer>,
        events: Option<EventSink>,
    ) -> Self {
        let attributes = renderer.attributes();
        let vsync_paced =
            config.enable_pacing || attributes.contains(RendererAttributes::FORCE_PACING);
        let render_on_thread = renderer.is_render_thread_supported();
        let display_fps = display_fps.max(1);

        Self {
            state: Mutex::new(PacerState {
                pacing_queue: FrameQueue::new(),
                render_queue: FrameQueue::new(),
                pacing_history: QueueHistory::half_second(display_fps),
                render_history: QueueHistory::half_second(config.max_video_fps),
                relaxation: RelaxationState::default(),
                stats: PacerStats::default(),
                vsync_pending: false,
                stopping: false,
            }),
            pacing_not_empty: Condvar::new(),
            render_not_empty: Condvar::new(),
            vsync_signalled: Condvar::new(),
            render: Mutex::new(RenderContext {
                renderer,
                deferred: DeferredFreeRing::new(),
            }),
            policy: DropPolicy::new(config.mode, config.relaxation.clone()),
            config,
            display_fps,
            vsync_paced: AtomicBool::new(vsync_paced),
            render_on_thread,
            no_buffering: attributes.contains(RendererAttributes::NO_BUFFERING),
            events,
        }
    }

    pub fn config(&self) -> &PacerConfig {
        &self.config
    }

    pub fn display_fps(&self) -> u32 {
        self.display_fps
    }

    pub fn is_vsync_paced(&self) -> bool {
        self.vsync_paced.load(Ordering::Acquire)
    }

    /// Route frames straight to the render queue. Used when no vsync source
    /// could be started.
    pub fn disable_vsync_pacing(&self) {
        self.vsync_paced.store(false, Ordering::Release);
    }

    pub fn renders_on_thread(&self) -> bool {
        self.render_on_thread
    }

    pub fn is_stopping(&self) -> bool {
        self.state.lock().stopping
    }

    // ---- decoder side ----

    /// Accept a decoded frame. Never blocks on rendering.
    pub fn submit_frame(&self, frame: Frame) {
        let mut state = self.state.lock();
        if state.stopping {
            drop(state);
            tracing::trace!("Pacer: stopping, releasing frame {}", frame.sequence());
            return;
        }

        state.stats.submitted_frames += 1;

        if !self.is_vsync_paced() {
            self.enqueue_for_rendering_and_unlock(state, frame);
            return;
        }

        // The relaxed window only counts paced submissions.
        self.policy.on_submission(&mut state.relaxation);
        let s = &mut *state;
        let drops = self.policy.make_room(&mut s.relaxation, &mut s.pacing_queue);
        s.account(&drops);
        s.pacing_queue.push(frame);
        drop(state);

        drop(drops);
        self.pacing_not_empty.notify_one();
    }

    /// Account a decoder backlog report of `depth` pending frames.
    pub fn notify_decoder_backlog(&self, depth: u32) {
        let mut state = self.state.lock();
        if self.policy.on_decoder_backlog(&mut state.relaxation, depth) {
            state.stats.relaxation_activations += 1;
        }
    }

    fn enqueue_for_rendering_and_unlock(&self, mut state: MutexGuard<'_, PacerState>, frame: Frame) {
        let s = &mut *state;
        let drops = self.policy.make_room(&mut s.relaxation, &mut s.render_queue);
        s.account(&drops);
        s.render_queue.push(frame);
        drop(state);

        drop(drops);
        if self.render_on_thread {
            self.render_not_empty.notify_one();
        } else if let Some(events) = &self.events {
            events.post(PresentEvent::RenderFrameReady);
        }
    }

    // ---- vsync side ----

    /// Service one vsync tick.
    ///
    /// Trims the pacing queue to its target, waits for a frame until shortly
    /// before the next vsync if none is queued, then releases the oldest frame
    /// to the render queue.
    pub fn handle_vsync(&self, time_until_next_vsync_ms: u64) -> VsyncOutcome {
        let mut state = self.state.lock();
        if state.stopping {
            return VsyncOutcome::Stopping;
        }

        // Only trim when the stream can keep up with the display; a slower
        // stream leaves the queue starved most ticks.
        let mut target = 1;
        if self.config.max_video_fps >= self.display_fps {
            if state.pacing_history.any_at_most(1) {
                target = self.config.lenient_pacing_target;
            }
            let depth = state.pacing_queue.len();
            state.pacing_history.record(depth);
        }

        while state.pacing_queue.len() > target {
            let Some(frame) = state.pacing_queue.pop() else {
                break;
            };
            state.stats.dropped_frames += 1;
            MutexGuard::unlocked(&mut state, move || drop(frame));
        }

        if state.pacing_queue.is_empty() {
            let slack = self.config.vsync_slack_ms;
            let wait = Duration::from_millis(time_until_next_vsync_ms.max(slack) - slack);
            let deadline = Instant::now() + wait;
            while state.pacing_queue.is_empty() && !state.stopping {
                if self
                    .pacing_not_empty
                    .wait_until(&mut state, deadline)
                    .timed_out()
                {
                    break;
                }
            }
        }

        if state.stopping {
            return VsyncOutcome::Stopping;
        }
        let Some(frame) = state.pacing_queue.pop() else {
            return VsyncOutcome::NoFrame;
        };

        self.enqueue_for_rendering_and_unlock(state, frame);
        VsyncOutcome::Released
    }

    /// Wait for an asynchronous vsync tick, or the timeout.
    ///
    /// A timeout still counts as a tick. Returns `false` once stopping.
    pub fn wait_for_vsync_signal(&self) -> bool {
        let timeout = Duration::from_millis(self.config.async_vsync_timeout_ms);
        let mut state = self.state.lock();
        if !state.vsync_pending && !state.stopping {
            let _ = self.vsync_signalled.wait_for(&mut state, timeout);
        }
        state.vsync_pending = false;
        !state.stopping
    }

    // ---- render side ----

    /// Render-thread body. Returns after [`begin_shutdown`](Self::begin_shutdown).
    pub fn run_render_loop(&self) {
        loop {
            self.render.lock().renderer.wait_to_render();

            let frame = {
                let mut state = self.state.lock();
                while state.render_queue.is_empty() && !state.stopping {
                    self.render_not_empty.wait(&mut state);
                }
                if state.stopping {
                    break;
                }
                state.render_queue.pop()
            };

            if let Some(frame) = frame {
                self.render_frame(frame);
            }
        }

        self.cleanup_render_context();
    }

    /// Render the next queued frame on the calling thread, if any.
    ///
    /// Ignored for renderers that run on the render thread.
    pub fn render_on_main_thread(&self) -> bool {
        if self.render_on_thread {
            return false;
        }
        self.render_next()
    }

    /// Pop and render one frame from the render queue without waiting.
    pub fn render_next(&self) -> bool {
        let frame = self.state.lock().render_queue.pop();
        match frame {
            Some(frame) => {
                self.render_frame(frame);
                true
            }
            None => false,
        }
    }

    fn render_frame(&self, frame: Frame) {
        let capture_time = frame.capture_time();

        let before = Instant::now();
        let evicted = {
            let mut render = self.render.lock();
            render.renderer.render_frame(&frame);
            render.deferred.retire(frame)
        };
        let after = Instant::now();
        drop(evicted);

        let mut state = self.state.lock();
        state.stats.rendered_frames += 1;
        state.stats.total_pacer_time += before.saturating_duration_since(capture_time);
        state.stats.total_render_time += after - before;

        let target = if self.no_buffering {
            1
        } else {
            let target = if state.render_history.any_at_most(0) {
                self.config.lenient_render_target
            } else {
                0
            };
            let depth = state.render_queue.len();
            state.render_history.record(depth);
            target
        };

        while state.render_queue.len() > target {
            let Some(frame) = state.render_queue.pop() else {
                break;
            };
            state.stats.dropped_frames += 1;
            MutexGuard::unlocked(&mut state, move || drop(frame));
        }
    }

    /// Tell the renderer its context is about to go away. Must run on the
    /// thread that rendered.
    pub fn cleanup_render_context(&self) {
        self.render.lock().renderer.cleanup_render_context();
    }

    // ---- lifecycle ----

    /// Stop accepting frames and wake every waiter.
    pub fn begin_shutdown(&self) {
        self.state.lock().stopping = true;
        self.pacing_not_empty.notify_all();
        self.vsync_signalled.notify_all();
        self.render_not_empty.notify_all();
    }

    /// Release every frame still held. Returns how many were released.
    pub fn drain(&self) -> usize {
        let (pacing, render) = {
            let mut state = self.state.lock();
            (state.pacing_queue.drain(), state.render_queue.drain())
        };
        let deferred = self.render.lock().deferred.drain();
        let released = pacing.len() + render.len() + deferred.len();
        drop((pacing, render, deferred));
        released
    }

    // ---- introspection ----

    pub fn stats(&self) -> PacerStats {
        self.state.lock().stats.clone()
    }

    /// Return the counters and reset them.
    pub fn take_stats(&self) -> PacerStats {
        std::mem::take(&mut self.state.lock().stats)
    }

    /// Current (pacing, render) queue depths.
    pub fn queue_depths(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.pacing_queue.len(), state.render_queue.len())
    }

    pub fn pacing_queue_sequences(&self) -> Vec<u64> {
        self.state.lock().pacing_queue.sequences()
    }

    pub fn render_queue_sequences(&self) -> Vec<u64> {
        self.state.lock().render_queue.sequences()
    }

    pub fn relaxation_state(&self) -> RelaxationState {
        self.state.lock().relaxation.clone()
    }

    /// Capacity the next enqueue is held to.
    pub fn effective_capacity(&self) -> usize {
        self.policy.effective_capacity(&self.state.lock().relaxation)
    }

    /// Frames retained for in-flight GPU work.
    pub fn deferred_frames(&self) -> usize {
        self.render.lock().deferred.len()
    }
}

impl VsyncListener for PacerCore {
    fn on_vsync(&self) {
        self.state.lock().vsync_pending = true;
        self.vsync_signalled.notify_one();
    }
}
