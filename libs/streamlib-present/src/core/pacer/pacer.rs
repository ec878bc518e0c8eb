// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::drop_policy::RelaxationState;
use super::pacer_core::PacerCore;
use super::stats::PacerStats;
use crate::core::config::PacerConfig;
use crate::core::events::EventSink;
use crate::core::frames::Frame;
use crate::core::renderer::Renderer;
use crate::core::vsync::{VsyncListener, VsyncSignal, VsyncSource};
use crate::core::{Result, StreamError};

/// Frame pacer.
///
/// Owns the vsync thread, the render thread (when the renderer supports
/// one), and the vsync source. Dropping the pacer shuts it down.
pub struct Pacer {
    core: Arc<PacerCore>,
    vsync_thread: Option<JoinHandle<Box<dyn VsyncSource>>>,
    render_thread: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl Pacer {
    /// Start pacing frames into `renderer`.
    ///
    /// `vsync` is only consulted when pacing is enabled. A source that fails
    /// to start leaves the pacer running unpaced.
    pub fn initialize(
        config: PacerConfig,
        renderer: Box<dyn Renderer>,
        vsync: Option<Box<dyn VsyncSource>>,
        events: Option<EventSink>,
    ) -> Result<Self> {
        config.validate()?;

        let display_fps = vsync
            .as_ref()
            .and_then(|source| source.refresh_rate_hz())
            .unwrap_or(config.display_fps);
        let period_ms = 1000 / u64::from(display_fps.max(1));

        let core = Arc::new(PacerCore::new(config, display_fps, renderer, events));

        tracing::info!(
            "Frame pacing: {} (mode {}, target {} Hz, max video {} FPS)",
            if core.is_vsync_paced() { "active" } else { "disabled" },
            core.config().mode,
            display_fps,
            core.config().max_video_fps
        );

        let mut vsync_thread = None;
        match vsync {
            Some(source) if core.is_vsync_paced() => {
                match Self::start_vsync_thread(&core, source, period_ms) {
                    Ok(handle) => vsync_thread = Some(handle),
                    Err(e) => {
                        tracing::warn!("Vsync source failed to start, pacing disabled: {}", e);
                        core.disable_vsync_pacing();
                    }
                }
            }
            _ => core.disable_vsync_pacing(),
        }

        let render_thread = if core.renders_on_thread() {
            let render_core = Arc::clone(&core);
            let handle = std::thread::Builder::new()
                .name("pacer-render".into())
                .spawn(move || render_core.run_render_loop())
                .map_err(|e| StreamError::Runtime(format!("Failed to spawn render thread: {}", e)))?;
            Some(handle)
        } else {
            None
        };

        Ok(Self {
            core,
            vsync_thread,
            render_thread,
            shut_down: false,
        })
    }

    fn start_vsync_thread(
        core: &Arc<PacerCore>,
        mut source: Box<dyn VsyncSource>,
        period_ms: u64,
    ) -> Result<JoinHandle<Box<dyn VsyncSource>>> {
        let listener: Arc<dyn VsyncListener> = Arc::clone(core) as Arc<dyn VsyncListener>;
        source.start(VsyncSignal::new(&listener))?;

        let vsync_core = Arc::clone(core);
        let spawned = std::thread::Builder::new()
            .name("pacer-vsync".into())
            .spawn(move || {
                vsync_loop(&vsync_core, source.as_mut(), period_ms);
                source
            });

        spawned.map_err(|e| StreamError::Runtime(format!("Failed to spawn vsync thread: {}", e)))
    }

    pub fn submit_frame(&self, frame: Frame) {
        self.core.submit_frame(frame);
    }

    pub fn notify_decoder_backlog(&self, depth: u32) {
        self.core.notify_decoder_backlog(depth);
    }

    /// Deliver an asynchronous vsync tick directly.
    pub fn signal_vsync(&self) {
        self.core.on_vsync();
    }

    /// Render the next queued frame. Call on
    /// [`PresentEvent::RenderFrameReady`](crate::core::events::PresentEvent::RenderFrameReady)
    /// when the renderer has no render thread.
    pub fn render_on_main_thread(&self) -> bool {
        self.core.render_on_main_thread()
    }

    pub fn is_vsync_paced(&self) -> bool {
        self.core.is_vsync_paced()
    }

    pub fn stats(&self) -> PacerStats {
        self.core.stats()
    }

    pub fn take_stats(&self) -> PacerStats {
        self.core.take_stats()
    }

    pub fn queue_depths(&self) -> (usize, usize) {
        self.core.queue_depths()
    }

    pub fn relaxation_state(&self) -> RelaxationState {
        self.core.relaxation_state()
    }

    pub fn core(&self) -> &Arc<PacerCore> {
        &self.core
    }

    /// Stop all threads and release every held frame.
    ///
    /// Order: vsync thread, vsync source, render thread (or render context
    /// cleanup on the caller's thread), then the queues.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.core.begin_shutdown();

        if let Some(handle) = self.vsync_thread.take() {
            match handle.join() {
                Ok(mut source) => source.stop(),
                Err(_) => tracing::error!("Vsync thread panicked"),
            }
        }

        match self.render_thread.take() {
            Some(handle) => {
                if handle.join().is_err() {
                    tracing::error!("Render thread panicked");
                }
            }
            None => self.core.cleanup_render_context(),
        }

        let released = self.core.drain();
        tracing::debug!("Pacer shut down, released {} frames", released);
    }
}

impl Drop for Pacer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn vsync_loop(core: &PacerCore, source: &mut dyn VsyncSource, period_ms: u64) {
    let is_async = source.is_async();
    loop {
        if is_async {
            if !core.wait_for_vsync_signal() {
                break;
            }
        } else if let Err(e) = source.wait_for_vsync() {
            tracing::warn!("Vsync wait failed: {}", e);
            std::thread::sleep(Duration::from_millis(period_ms));
        }

        if core.is_stopping() {
            break;
        }

        core.handle_vsync(period_ms);
    }
    tracing::debug!("Vsync thread exiting");
}
