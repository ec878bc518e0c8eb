// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Two-step GPU render pipeline.
//!
//! [`RenderPipeline::initialize`] resolves a [`RenderPlan`] once and builds
//! the textures and fences it needs. Each [`render_frame`](Renderer::render_frame)
//! call then:
//!
//! 1. Falls back to repeating the previous output (or a blank frame) while the
//!    previous frame's graphics work is still in flight.
//! 2. Acquires the decoder surface through its interop path.
//! 3. Runs step 1 and, unless it is `None`, step 2. Each step brackets its
//!    work with resource transitions and fences its engine: a GPU-side wait
//!    for the next consumer, or a CPU wait when it is the last step.
//! 4. Clears the back buffer, copies the output at its letterbox offset, draws
//!    overlays and presents.
//! 5. Waits on every engine it used before resetting their allocators.
//!
//! Per-frame failures degrade to a repeated frame. Only device loss and
//! window or HDR changes leave the pipeline, as [`PresentEvent`]s.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::accelerator::{AcceleratorBackend, EvaluateParams, accelerator_for};
use super::capabilities::GpuCapabilities;
use super::color::CscConstants;
use super::device::{
    CommandList, GpuCommand, GpuDevice, ResourceState, ShaderPass, VideoProcessorQuery,
};
use super::fence::{Engine, FenceChannel, FenceTicket};
use super::overlay::{OverlayKind, OverlayManager, OverlayProvider};
use super::render_step::{RenderStep, StepOutcome, StepRouting, TextureRole};
use super::selection::{ProbeResults, RenderPlan, SelectionInputs, resolve_render_plan};
use super::texture::{OutputRect, TextureGeometry, TextureId};
use crate::core::config::RendererSettings;
use crate::core::events::{EventSink, PresentEvent, ResetReason};
use crate::core::frames::{Frame, FrameBacking, FrameDescriptor, PixelFormat};
use crate::core::renderer::{Renderer, RendererAttributes, StreamParameters};
use crate::core::{InitFailureReason, Result, StreamError};

/// Bound on the swap chain's frame-latency wait.
const FRAME_LATENCY_TIMEOUT: Duration = Duration::from_millis(1000);
const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Per-session presentation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RenderCounters {
    /// Freshly processed frames presented.
    pub presented: u64,
    /// Previous output presented again.
    pub repeated: u64,
    /// Black frames presented for lack of any output.
    pub blank: u64,
    /// Submissions or fence operations that failed for one frame.
    pub transient_failures: u64,
    pub device_lost: u64,
}

/// Read/write states an engine expects its input and output in.
fn step_states(engine: Engine) -> (ResourceState, ResourceState) {
    match engine {
        Engine::VideoProcess => (
            ResourceState::VideoProcessRead,
            ResourceState::VideoProcessWrite,
        ),
        Engine::Accelerator => (ResourceState::ShaderResource, ResourceState::UnorderedAccess),
        _ => (ResourceState::ShaderResource, ResourceState::RenderTarget),
    }
}

/// Resources built by `initialize` and torn down with the session.
struct Session {
    plan: RenderPlan,
    geometry: TextureGeometry,
    routing: StepRouting,
    textures: HashMap<TextureRole, TextureId>,
    /// Scratch target between NVIDIA VSR and TrueHDR.
    vendor_scratch: Option<TextureId>,
    fences: HashMap<Engine, FenceChannel>,
    /// Signalled after a locked decoder-surface copy.
    interop: FenceChannel,
    accelerator: Box<dyn AcceleratorBackend>,
    csc: CscConstants,
    last_descriptor: Option<FrameDescriptor>,
    allow_tearing: bool,
    vsync: bool,
    edge_enhancement: u32,
    window: (u32, u32),
    display_hdr: bool,
    /// Latest graphics submission. Still pending at the next frame means skip.
    pending: Option<FenceTicket>,
    previous_output: Option<TextureId>,
    /// Last ticket per engine used this frame.
    used: Vec<FenceTicket>,
}

impl Session {
    fn texture(&self, role: TextureRole) -> Result<TextureId> {
        self.textures
            .get(&role)
            .copied()
            .ok_or_else(|| StreamError::Runtime(format!("no {:?} texture in this session", role)))
    }

    fn fence(&mut self, engine: Engine) -> Result<&mut FenceChannel> {
        self.fences
            .get_mut(&engine)
            .ok_or_else(|| StreamError::Fence(format!("no fence for the {} engine", engine)))
    }

    /// Engines that read the decoder surface this session.
    fn consumer_engines(&self) -> Vec<Engine> {
        let mut engines = Vec::with_capacity(3);
        for step in [self.plan.step1, self.plan.step2] {
            match step.engine() {
                Some(engine) if !engines.contains(&engine) => engines.push(engine),
                _ => {}
            }
        }
        if !engines.contains(&Engine::Graphics) {
            engines.push(Engine::Graphics);
        }
        engines
    }

    fn record_used(&mut self, ticket: FenceTicket) {
        match self.used.iter_mut().find(|t| t.engine() == ticket.engine()) {
            Some(slot) => *slot = ticket,
            None => self.used.push(ticket),
        }
    }

    fn graphics_busy(&self) -> bool {
        match (self.pending, self.fences.get(&Engine::Graphics)) {
            (Some(ticket), Some(fence)) => !fence.is_complete(ticket),
            _ => false,
        }
    }

    fn update_csc(&mut self, descriptor: &FrameDescriptor) {
        let changed = self
            .last_descriptor
            .is_none_or(|last| last.format_changed(descriptor));
        if changed {
            self.csc = CscConstants::for_frame(descriptor);
            self.last_descriptor = Some(*descriptor);
            tracing::debug!(
                "Colour conversion updated: {:?} {:?} {:?}",
                descriptor.color_space,
                descriptor.range,
                descriptor.format
            );
        }
    }

    /// Texture the steps read for this frame, or `None` when the frame has no GPU surface.
    fn acquire_source(&mut self, device: &mut dyn GpuDevice, frame: &Frame) -> Result<Option<TextureId>> {
        match frame.backing() {
            FrameBacking::SharedFence {
                surface,
                fence_value,
            } => {
                // The decoder may still be writing. Every consumer waits on its fence.
                let timeline = device.decoder_timeline();
                for engine in self.consumer_engines() {
                    timeline.queue_wait(engine, fence_value)?;
                }
                device.source_texture(surface).map(Some)
            }
            FrameBacking::LockedCopy { surface } => {
                let target = self.texture(TextureRole::Source)?;
                let ticket = {
                    let lock = device.decoder_lock();
                    let _guard = lock.lock();
                    device.copy_decoder_surface(surface, target)?;
                    self.interop.signal()?
                };
                if self.vsync {
                    for engine in self.consumer_engines() {
                        self.interop.wait_gpu(engine, ticket)?;
                    }
                }
                Ok(Some(target))
            }
            FrameBacking::Cpu => Ok(None),
        }
    }

    fn step_commands(&self, step: RenderStep, input: TextureId, output: TextureId) -> Vec<GpuCommand> {
        let video_process = |convert, scale| GpuCommand::VideoProcess {
            input,
            output,
            convert,
            scale,
            edge_enhancement: self.edge_enhancement,
        };
        let shader = |pass| GpuCommand::Shader {
            pass,
            input,
            output,
        };
        match step {
            RenderStep::AllVideoProcessor => vec![video_process(true, true)],
            RenderStep::ConvertVideoProcessor => vec![video_process(true, false)],
            RenderStep::UpscaleVideoProcessor => vec![video_process(false, true)],
            RenderStep::ConvertShader => vec![shader(ShaderPass::Convert(self.csc))],
            RenderStep::UpscaleShader => vec![shader(ShaderPass::Upscale(self.plan.enhancer))],
            RenderStep::SharpenShader => vec![shader(ShaderPass::Sharpen(self.plan.enhancer))],
            RenderStep::AllAmf | RenderStep::ConvertAmf | RenderStep::UpscaleAmf | RenderStep::UpscaleVsr => {
                self.accelerator.evaluate(&EvaluateParams {
                    step,
                    input,
                    output,
                    scratch: self.vendor_scratch,
                    quality: self.plan.vsr_quality,
                    sdr_to_hdr: self.plan.vendor_hdr,
                })
            }
            RenderStep::None => Vec::new(),
        }
    }

    /// Record, submit and fence one step. `next` is the engine consuming the output,
    /// `None` when this is the last step.
    fn run_step(
        &mut self,
        device: &mut dyn GpuDevice,
        step: RenderStep,
        input: TextureId,
        output: TextureId,
        next: Option<Engine>,
    ) -> Result<StepOutcome> {
        let Some(engine) = step.engine() else {
            return Ok(StepOutcome::Continue);
        };

        let commands = self.step_commands(step, input, output);
        if commands.is_empty() {
            tracing::warn!("{} produced no commands", step);
            return Ok(StepOutcome::Abort);
        }

        let (read, write) = step_states(engine);
        let mut list = CommandList::new(engine);
        list.transition(input, ResourceState::Common, read);
        list.transition(output, ResourceState::Common, write);
        list.extend(commands);
        list.transition(input, read, ResourceState::Common);
        list.transition(output, write, ResourceState::Common);
        device.execute(list)?;

        let fence = self.fence(engine)?;
        let ticket = fence.signal()?;
        match next {
            Some(waiter) => fence.wait_gpu(waiter, ticket)?,
            None => fence.wait_cpu(ticket)?,
        }
        self.record_used(ticket);
        Ok(StepOutcome::Continue)
    }

    /// Run both steps on `source`. Returns the output texture, or `None` on abort.
    fn process(&mut self, device: &mut dyn GpuDevice, source: TextureId) -> Result<Option<TextureId>> {
        let step1 = self.plan.step1;
        let step2 = self.plan.step2;
        let step1_output = self.texture(self.routing.step1_output)?;

        if step2.is_none() {
            if self.run_step(device, step1, source, step1_output, None)? == StepOutcome::Abort {
                return Ok(None);
            }
            return Ok(Some(step1_output));
        }

        let output = self.texture(self.routing.step2_output)?;
        if self.run_step(device, step1, source, step1_output, step2.engine())? == StepOutcome::Abort {
            return Ok(None);
        }
        if self.run_step(device, step2, step1_output, output, None)? == StepOutcome::Abort {
            return Ok(None);
        }
        Ok(Some(output))
    }

    /// Clear, copy `output` at the letterbox offset, draw overlays and present.
    fn compose_and_present(
        &mut self,
        device: &mut dyn GpuDevice,
        output: Option<TextureId>,
        overlays: Option<&OverlayManager>,
        counters: &mut RenderCounters,
    ) -> Result<()> {
        let back = device.back_buffer()?;
        let mut list = CommandList::new(Engine::Graphics);
        list.transition(back, ResourceState::Present, ResourceState::RenderTarget);
        list.push(GpuCommand::Clear {
            target: back,
            rgba: BLACK,
        });
        if let Some(output) = output {
            let rect = self.geometry.output;
            list.transition(output, ResourceState::Common, ResourceState::CopySource);
            list.push(GpuCommand::CopyRegion {
                src: output,
                dst: back,
                left: rect.left,
                top: rect.top,
            });
            list.transition(output, ResourceState::CopySource, ResourceState::Common);
        }
        if let Some(overlays) = overlays {
            let display = OutputRect {
                left: 0,
                top: 0,
                width: self.geometry.display_width,
                height: self.geometry.display_height,
            };
            list.extend(overlays.draw_commands(back, display));
        }
        list.transition(back, ResourceState::RenderTarget, ResourceState::Present);

        // A failed submission still presents, showing whatever the back buffer holds.
        match device.execute(list) {
            Ok(()) => {
                let ticket = self.fence(Engine::Graphics)?.signal()?;
                self.pending = Some(ticket);
                self.record_used(ticket);
            }
            Err(e) => {
                counters.transient_failures += 1;
                tracing::warn!("Back buffer submission failed: {}", e);
            }
        }

        let allow_tearing = self.allow_tearing && !self.vsync;
        device.present(0, allow_tearing)
    }

    /// CPU wait on each engine used this frame, then reset its allocator.
    fn reset_engines(&mut self, device: &mut dyn GpuDevice, counters: &mut RenderCounters) {
        let used = std::mem::take(&mut self.used);
        for ticket in used {
            let waited = match self.fences.get(&ticket.engine()) {
                Some(fence) => fence.wait_cpu(ticket),
                None => continue,
            };
            let reset = waited.and_then(|()| device.reset_command_allocator(ticket.engine()));
            if let Err(e) = reset {
                counters.transient_failures += 1;
                tracing::debug!("{} engine not reset this frame: {}", ticket.engine(), e);
            }
        }
    }
}

/// Renderer driving a [`GpuDevice`] through a resolved two-step plan.
pub struct RenderPipeline {
    device: Box<dyn GpuDevice>,
    settings: RendererSettings,
    overlay_provider: Option<Arc<dyn OverlayProvider>>,
    overlays: Option<Arc<OverlayManager>>,
    events: Option<EventSink>,
    fence_timeout: Duration,
    caps: Option<GpuCapabilities>,
    session: Option<Session>,
    counters: RenderCounters,
}

impl RenderPipeline {
    pub fn new(
        device: Box<dyn GpuDevice>,
        settings: RendererSettings,
        overlay_provider: Option<Arc<dyn OverlayProvider>>,
        events: Option<EventSink>,
    ) -> Self {
        Self {
            device,
            settings,
            overlay_provider,
            overlays: None,
            events,
            fence_timeout: FenceChannel::DEFAULT_CPU_TIMEOUT,
            caps: None,
            session: None,
            counters: RenderCounters::default(),
        }
    }

    /// Bound on every CPU fence wait.
    pub fn with_fence_timeout(mut self, timeout: Duration) -> Self {
        self.fence_timeout = timeout;
        self
    }

    pub fn plan(&self) -> Option<&RenderPlan> {
        self.session.as_ref().map(|s| &s.plan)
    }

    pub fn capabilities(&self) -> Option<&GpuCapabilities> {
        self.caps.as_ref()
    }

    pub fn geometry(&self) -> Option<&TextureGeometry> {
        self.session.as_ref().map(|s| &s.geometry)
    }

    pub fn counters(&self) -> RenderCounters {
        self.counters
    }

    /// Overlay manager for reporting threads. Present once initialized with a provider.
    pub fn overlay_manager(&self) -> Option<Arc<OverlayManager>> {
        self.overlays.clone()
    }

    fn post(&self, event: PresentEvent) {
        if let Some(events) = &self.events {
            events.post(event);
        }
    }

    fn probe(&self, caps: &GpuCapabilities, geometry: &TextureGeometry, accelerator: &dyn AcceleratorBackend) -> ProbeResults {
        let device = self.device.as_ref();
        let convert = VideoProcessorQuery {
            input_format: geometry.decoder_format,
            input_width: geometry.texture_width,
            input_height: geometry.texture_height,
            output_format: geometry.rgb_format,
            output_width: geometry.texture_width,
            output_height: geometry.texture_height,
        };
        let upscale = VideoProcessorQuery {
            output_width: geometry.output.width,
            output_height: geometry.output.height,
            ..convert
        };
        let vendor = accelerator.probe(caps, device);
        ProbeResults {
            vendor_upscale: vendor.upscale,
            vendor_hdr: vendor.sdr_to_hdr,
            vp_convert: device.supports_video_processor(&convert),
            vp_upscale: device.supports_video_processor(&upscale),
        }
    }

    fn create_textures(
        &mut self,
        geometry: &TextureGeometry,
        roles: &[TextureRole],
    ) -> Result<HashMap<TextureRole, TextureId>> {
        let mut textures = HashMap::with_capacity(roles.len());
        for &role in roles {
            if textures.contains_key(&role) {
                continue;
            }
            let desc = geometry.descriptor(role);
            match self.device.create_texture(&desc) {
                Ok(id) => {
                    textures.insert(role, id);
                }
                Err(e) => {
                    for id in textures.into_values() {
                        self.device.destroy_texture(id);
                    }
                    return Err(StreamError::init(
                        InitFailureReason::Unknown,
                        format!("creating {} texture: {}", desc.label, e),
                    ));
                }
            }
        }
        Ok(textures)
    }

    fn teardown(&mut self) {
        if let Some(overlays) = self.overlays.take() {
            overlays.set_accepting(false);
            overlays.clear();
        }
        if let Some(session) = self.session.take() {
            for id in session.textures.into_values() {
                self.device.destroy_texture(id);
            }
        }
    }

    fn present_fallback(&mut self, session: &mut Session) {
        let output = session.previous_output;
        if output.is_some() {
            self.counters.repeated += 1;
        } else {
            self.counters.blank += 1;
        }
        let overlays = self.overlays.as_deref();
        match session.compose_and_present(self.device.as_mut(), output, overlays, &mut self.counters) {
            Ok(()) => session.reset_engines(self.device.as_mut(), &mut self.counters),
            Err(e) => self.handle_present_error(e),
        }
    }

    fn handle_present_error(&mut self, err: StreamError) {
        match err {
            StreamError::DeviceLost(msg) => {
                self.counters.device_lost += 1;
                tracing::warn!("Device lost while presenting: {}", msg);
                self.post(PresentEvent::RenderTargetsReset(ResetReason::DeviceLost));
            }
            other => {
                self.counters.transient_failures += 1;
                tracing::warn!("Present failed: {}", other);
            }
        }
    }

    fn check_display_changes(&mut self, session: &mut Session) {
        let window = self.device.window_size();
        if window != session.window {
            tracing::info!(
                "Window resized from {}x{} to {}x{}",
                session.window.0,
                session.window.1,
                window.0,
                window.1
            );
            session.window = window;
            self.post(PresentEvent::RenderTargetsReset(ResetReason::WindowResized));
        }

        let hdr = self.device.display_hdr_enabled();
        if hdr != session.display_hdr {
            tracing::info!("Display HDR {}", if hdr { "enabled" } else { "disabled" });
            session.display_hdr = hdr;
            self.post(PresentEvent::RenderTargetsReset(ResetReason::DisplayHdrChanged));
        }
    }

    fn render(&mut self, session: &mut Session, frame: &Frame) {
        if !self.device.wait_frame_latency(FRAME_LATENCY_TIMEOUT) {
            tracing::trace!("Frame latency wait timed out");
        }

        if session.graphics_busy() {
            tracing::trace!("Previous frame still on the GPU, skipping frame {}", frame.sequence());
            self.present_fallback(session);
            return;
        }

        session.update_csc(frame.descriptor());

        let output = session
            .acquire_source(self.device.as_mut(), frame)
            .and_then(|source| match source {
                Some(source) => session.process(self.device.as_mut(), source),
                None => Ok(None),
            });
        let output = match output {
            Ok(Some(output)) => output,
            Ok(None) => {
                self.present_fallback(session);
                return;
            }
            Err(e) => {
                self.counters.transient_failures += 1;
                tracing::warn!("Frame {} not processed: {}", frame.sequence(), e);
                self.present_fallback(session);
                return;
            }
        };

        let overlays = self.overlays.as_deref();
        if let Err(e) = session.compose_and_present(self.device.as_mut(), Some(output), overlays, &mut self.counters) {
            self.handle_present_error(e);
            return;
        }
        self.counters.presented += 1;
        session.previous_output = Some(output);
        session.reset_engines(self.device.as_mut(), &mut self.counters);
        self.check_display_changes(session);
    }
}

impl Renderer for RenderPipeline {
    fn initialize(&mut self, params: &StreamParameters) -> Result<()> {
        self.teardown();

        let info = self.device.adapter_info();
        let caps = GpuCapabilities::from_adapter(&info, self.device.features(), self.device.power_source());
        tracing::info!(
            "Adapter {} ({}), integrated: {}, low-end: {}, battery: {}",
            caps.adapter_name,
            caps.vendor,
            caps.integrated,
            caps.low_end,
            caps.on_battery
        );

        let geometry = TextureGeometry::new(params);
        let device_hdr = self.device.display_hdr_enabled();
        let mut accelerator = accelerator_for(caps.vendor);
        let mut probes = self.probe(&caps, &geometry, accelerator.as_ref());

        let mut inputs = SelectionInputs {
            caps: &caps,
            hdr_stream: params.hdr,
            yuv444: params.yuv444,
            enhancer_override: self.settings.enhancer_override,
            edge_enhancement: self.settings.edge_enhancement,
            display_hdr: self.settings.display_hdr || device_hdr,
            probes,
        };
        let mut plan = resolve_render_plan(&inputs);

        if plan.vendor_upscale || plan.vendor_hdr {
            if let Err(e) = accelerator.activate(self.device.as_mut(), plan.vendor_upscale, plan.vendor_hdr) {
                tracing::warn!("{} activation failed, reselecting: {}", accelerator.name(), e);
                probes.vendor_upscale = false;
                probes.vendor_hdr = false;
                inputs.probes = probes;
                plan = resolve_render_plan(&inputs);
            }
        }
        tracing::info!("Render plan: {}", plan);

        let routing = StepRouting::for_steps(plan.step2);
        let mut roles = vec![TextureRole::Source];
        roles.extend(routing.intermediates());
        let needs_scratch = plan.step2 == RenderStep::UpscaleVsr && plan.vendor_hdr;
        if needs_scratch {
            roles.push(TextureRole::RgbUpscaled);
        }
        let textures = self.create_textures(&geometry, &roles)?;
        let vendor_scratch = if needs_scratch {
            textures.get(&TextureRole::RgbUpscaled).copied()
        } else {
            None
        };

        let fences = [Engine::VideoProcess, Engine::Graphics, Engine::Accelerator]
            .into_iter()
            .map(|engine| {
                let fence = FenceChannel::new(engine, self.device.timeline(engine))
                    .with_cpu_timeout(self.fence_timeout);
                (engine, fence)
            })
            .collect();
        let interop = FenceChannel::new(Engine::Decoder, self.device.timeline(Engine::Decoder))
            .with_cpu_timeout(self.fence_timeout);

        if let Some(provider) = &self.overlay_provider {
            let fence = FenceChannel::new(Engine::Overlay, self.device.timeline(Engine::Overlay))
                .with_cpu_timeout(self.fence_timeout);
            let manager = Arc::new(OverlayManager::new(
                Arc::clone(provider),
                self.device.overlay_uploader(),
                fence,
            ));
            manager.set_accepting(true);
            for kind in OverlayKind::ALL {
                if let Err(e) = manager.notify_overlay_updated(kind) {
                    tracing::debug!("Initial {:?} overlay not uploaded: {}", kind, e);
                }
            }
            self.overlays = Some(manager);
        }

        let csc = CscConstants::for_frame(&FrameDescriptor::new(
            params.width,
            params.height,
            PixelFormat::for_stream(params.hdr, params.yuv444),
        ));

        self.session = Some(Session {
            plan,
            geometry,
            routing,
            textures,
            vendor_scratch,
            fences,
            interop,
            accelerator,
            csc,
            last_descriptor: None,
            allow_tearing: self.settings.allow_tearing && caps.tearing_supported,
            vsync: self.settings.vsync,
            edge_enhancement: self.settings.edge_enhancement,
            window: self.device.window_size(),
            display_hdr: device_hdr,
            pending: None,
            previous_output: None,
            used: Vec::new(),
        });
        self.caps = Some(caps);
        Ok(())
    }

    fn render_frame(&mut self, frame: &Frame) {
        let Some(mut session) = self.session.take() else {
            tracing::trace!("Frame {} dropped, pipeline not initialized", frame.sequence());
            return;
        };
        self.render(&mut session, frame);
        self.session = Some(session);
    }

    fn cleanup_render_context(&mut self) {
        if let Some(overlays) = &self.overlays {
            overlays.set_accepting(false);
        }
    }

    fn attributes(&self) -> RendererAttributes {
        let mut attrs = RendererAttributes::HDR_SUPPORT;
        if self.settings.exclusive_fullscreen {
            attrs |= RendererAttributes::FORCE_PACING;
        }
        attrs
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::SurfaceId;
    use crate::core::renderer::VideoCodec;
    use crate::gpu::capabilities::{AdapterInfo, GpuVendor};
    use crate::gpu::software::SoftwareGpuDevice;

    fn params() -> StreamParameters {
        StreamParameters::new(VideoCodec::Hevc, 1280, 720, 60).with_window(1920, 1080)
    }

    fn frame(seq: u64, backing: FrameBacking) -> Frame {
        Frame::new(seq, FrameDescriptor::new(1280, 720, PixelFormat::Nv12), backing)
    }

    fn pipeline(device: &SoftwareGpuDevice) -> RenderPipeline {
        RenderPipeline::new(Box::new(device.clone()), RendererSettings::default(), None, None)
            .with_fence_timeout(Duration::from_millis(20))
    }

    #[test]
    fn test_attributes() {
        let device = SoftwareGpuDevice::new();
        let p = pipeline(&device);
        assert_eq!(p.attributes(), RendererAttributes::HDR_SUPPORT);

        let settings = RendererSettings {
            exclusive_fullscreen: true,
            ..RendererSettings::default()
        };
        let p = RenderPipeline::new(Box::new(device), settings, None, None);
        assert!(p.attributes().contains(RendererAttributes::FORCE_PACING));
    }

    #[test]
    fn test_render_before_initialize_is_ignored() {
        let device = SoftwareGpuDevice::new();
        let mut p = pipeline(&device);
        p.render_frame(&frame(1, FrameBacking::Cpu));
        assert_eq!(p.counters(), RenderCounters::default());
        assert_eq!(device.present_count(), 0);
    }

    #[test]
    fn test_cpu_frame_presents_blank() {
        let device = SoftwareGpuDevice::new();
        let mut p = pipeline(&device);
        p.initialize(&params()).unwrap();
        p.render_frame(&frame(1, FrameBacking::Cpu));
        assert_eq!(p.counters().blank, 1);
        assert_eq!(device.present_count(), 1);
    }

    #[test]
    fn test_shared_fence_frame_waits_on_decoder() {
        let device = SoftwareGpuDevice::new();
        let mut p = pipeline(&device);
        p.initialize(&params()).unwrap();
        p.render_frame(&frame(
            1,
            FrameBacking::SharedFence {
                surface: SurfaceId(0),
                fence_value: 7,
            },
        ));
        assert_eq!(p.counters().presented, 1);
        let waits = device.decoder_queued_waits();
        assert!(waits.contains(&(Engine::Graphics, 7)));
    }

    #[test]
    fn test_teardown_destroys_textures() {
        let device = SoftwareGpuDevice::new();
        let mut p = pipeline(&device);
        p.initialize(&params()).unwrap();
        assert!(device.live_textures() > 0);
        drop(p);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn test_activation_failure_reselects() {
        let device = SoftwareGpuDevice::with_adapter(AdapterInfo {
            vendor_id: GpuVendor::Amd.pci_id(),
            name: "AMD Radeon RX 7900 XTX".into(),
            dedicated_video_memory: 24 << 30,
            shared_system_memory: 16 << 30,
        });
        device.fail_vendor_activation(true);
        let mut p = pipeline(&device);
        p.initialize(&params()).unwrap();
        let plan = p.plan().unwrap();
        assert!(!plan.vendor_upscale);
        assert_eq!(plan.step1, RenderStep::AllVideoProcessor);
    }
}
