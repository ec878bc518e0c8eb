// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Device contract the render pipeline drives.
//!
//! Work is recorded into a [`CommandList`] per engine and submitted with
//! [`GpuDevice::execute`]. Completion is only ever observed through the
//! engine's [`FenceTimeline`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::capabilities::{AdapterInfo, DeviceFeatures, PowerSource};
use super::color::CscConstants;
use super::fence::{Engine, FenceTimeline};
use super::overlay::OverlayUploader;
use super::render_step::ShaderEnhancer;
use super::selection::VsrQuality;
use super::texture::{TextureDescriptor, TextureFormat, TextureId};
use crate::core::Result;
use crate::core::frames::SurfaceId;

/// Resource states a texture moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Common,
    VideoProcessRead,
    VideoProcessWrite,
    ShaderResource,
    RenderTarget,
    UnorderedAccess,
    CopySource,
    CopyDest,
    Present,
}

/// Shader passes the graphics engine can run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderPass {
    /// YUV to RGB.
    Convert(CscConstants),
    Upscale(ShaderEnhancer),
    Sharpen(ShaderEnhancer),
}

/// Vendor features exposed as driver extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VendorFeature {
    AmfScaler,
    AmfSdrToHdr,
    IntelVpeScaler,
    IntelVpeSdrToHdr,
    NvidiaVsr,
    NvidiaTrueHdr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    Transition {
        texture: TextureId,
        from: ResourceState,
        to: ResourceState,
    },
    VideoProcess {
        input: TextureId,
        output: TextureId,
        convert: bool,
        scale: bool,
        edge_enhancement: u32,
    },
    Shader {
        pass: ShaderPass,
        input: TextureId,
        output: TextureId,
    },
    VendorEvaluate {
        backend: &'static str,
        input: TextureId,
        output: TextureId,
        convert: bool,
        scale: bool,
        quality: VsrQuality,
        sdr_to_hdr: bool,
    },
    Clear {
        target: TextureId,
        rgba: [f32; 4],
    },
    /// Copy all of `src` into `dst` at the given offset.
    CopyRegion {
        src: TextureId,
        dst: TextureId,
        left: u32,
        top: u32,
    },
    DrawOverlay {
        overlay: TextureId,
        target: TextureId,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    },
}

/// Commands recorded for one engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandList {
    engine: Engine,
    commands: Vec<GpuCommand>,
}

impl CommandList {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            commands: Vec::new(),
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn push(&mut self, command: GpuCommand) {
        self.commands.push(command);
    }

    pub fn extend(&mut self, commands: impl IntoIterator<Item = GpuCommand>) {
        self.commands.extend(commands);
    }

    pub fn transition(&mut self, texture: TextureId, from: ResourceState, to: ResourceState) {
        if from != to {
            self.commands.push(GpuCommand::Transition { texture, from, to });
        }
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

/// Video-processor capability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoProcessorQuery {
    pub input_format: TextureFormat,
    pub input_width: u32,
    pub input_height: u32,
    pub output_format: TextureFormat,
    pub output_width: u32,
    pub output_height: u32,
}

/// A GPU device with independent engines and a swap chain.
pub trait GpuDevice: Send {
    fn adapter_info(&self) -> AdapterInfo;

    fn features(&self) -> DeviceFeatures;

    fn power_source(&self) -> PowerSource {
        PowerSource::Ac
    }

    fn supports_video_processor(&self, query: &VideoProcessorQuery) -> bool;

    fn supports_vendor_feature(&self, feature: VendorFeature) -> bool;

    fn set_vendor_feature(&mut self, feature: VendorFeature, enable: bool) -> Result<()>;

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId>;

    fn destroy_texture(&mut self, texture: TextureId);

    /// Texture backing a decoder surface.
    fn source_texture(&mut self, surface: SurfaceId) -> Result<TextureId>;

    /// Copy a decoder surface into `dst` on the decoder's own context.
    /// Callers hold [`decoder_lock`](Self::decoder_lock) around it.
    fn copy_decoder_surface(&mut self, surface: SurfaceId, dst: TextureId) -> Result<()>;

    /// Lock serializing access to the decoder's device context.
    fn decoder_lock(&self) -> Arc<Mutex<()>>;

    /// Submit a command list. Failure is transient and per frame.
    fn execute(&mut self, list: CommandList) -> Result<()>;

    fn timeline(&self, engine: Engine) -> Arc<dyn FenceTimeline>;

    /// Timeline the decoder signals when a shared surface is ready.
    fn decoder_timeline(&self) -> Arc<dyn FenceTimeline>;

    fn back_buffer(&mut self) -> Result<TextureId>;

    /// Present the current back buffer. Device removal is reported as
    /// [`StreamError::DeviceLost`](crate::core::StreamError::DeviceLost).
    fn present(&mut self, sync_interval: u32, allow_tearing: bool) -> Result<()>;

    fn reset_command_allocator(&mut self, engine: Engine) -> Result<()>;

    /// Wait on the swap chain's frame-latency object. Returns `false` on timeout.
    fn wait_frame_latency(&mut self, timeout: Duration) -> bool;

    fn window_size(&self) -> (u32, u32);

    fn display_hdr_enabled(&self) -> bool;

    fn overlay_uploader(&self) -> Arc<dyn OverlayUploader>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_skips_noop() {
        let mut list = CommandList::new(Engine::Graphics);
        list.transition(TextureId(1), ResourceState::Common, ResourceState::Common);
        assert!(list.is_empty());
        list.transition(TextureId(1), ResourceState::Common, ResourceState::RenderTarget);
        assert_eq!(list.len(), 1);
        assert_eq!(list.engine(), Engine::Graphics);
    }
}
