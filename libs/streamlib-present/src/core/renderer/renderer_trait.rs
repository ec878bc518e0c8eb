// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Renderer contract consumed by the pacer.

use super::{RendererAttributes, StreamParameters};
use crate::core::Result;
use crate::core::frames::Frame;

/// A presentation backend.
///
/// The pacer calls [`wait_to_render`](Renderer::wait_to_render) and
/// [`render_frame`](Renderer::render_frame) from its render thread (or the
/// application's main thread when [`is_render_thread_supported`](Renderer::is_render_thread_supported)
/// is false). Per-frame GPU failures are absorbed inside `render_frame`; only
/// session-invalidating conditions leave the renderer, as events.
pub trait Renderer: Send {
    /// Build device resources for a stream. An error is fatal for this backend only.
    fn initialize(&mut self, params: &StreamParameters) -> Result<()>;

    fn render_frame(&mut self, frame: &Frame);

    /// Back-pressure hook, called before each frame is dequeued.
    fn wait_to_render(&mut self) {}

    /// Release per-thread render state. Called on the thread that rendered.
    fn cleanup_render_context(&mut self) {}

    fn attributes(&self) -> RendererAttributes {
        RendererAttributes::empty()
    }

    fn is_render_thread_supported(&self) -> bool {
        true
    }
}
