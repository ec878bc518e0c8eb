// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Render pipeline against the software device.

use std::sync::Arc;
use std::time::Duration;

use streamlib_present::core::config::RendererSettings;
use streamlib_present::core::events::{EventSink, PresentEvent, ResetReason};
use streamlib_present::core::frames::{
    ColorSpace, Frame, FrameBacking, FrameDescriptor, PixelFormat, SurfaceId,
};
use streamlib_present::core::renderer::{Renderer, StreamParameters, VideoCodec};
use streamlib_present::gpu::device::{GpuCommand, ShaderPass};
use streamlib_present::gpu::{
    Engine, GpuVendor, OverlayKind, OverlayProvider, OverlaySurface, RenderPipeline, RenderStep,
    SoftwareGpuDevice, TextureId, VendorFeature,
};

fn params() -> StreamParameters {
    StreamParameters::new(VideoCodec::Hevc, 1280, 720, 60).with_window(1920, 1080)
}

fn locked_frame(seq: u64) -> Frame {
    Frame::new(
        seq,
        FrameDescriptor::new(1280, 720, PixelFormat::Nv12),
        FrameBacking::LockedCopy {
            surface: SurfaceId(3),
        },
    )
}

fn build(device: &SoftwareGpuDevice, settings: RendererSettings, events: Option<EventSink>) -> RenderPipeline {
    let mut pipeline = RenderPipeline::new(Box::new(device.clone()), settings, None, events)
        .with_fence_timeout(Duration::from_millis(20));
    pipeline.initialize(&params()).unwrap();
    pipeline
}

fn engines(device: &SoftwareGpuDevice) -> Vec<Engine> {
    device.executed().iter().map(|list| list.engine()).collect()
}

#[test]
fn test_video_processor_pipeline_letterboxes() {
    let device = SoftwareGpuDevice::new();
    let mut pipeline = RenderPipeline::new(Box::new(device.clone()), RendererSettings::default(), None, None);
    pipeline
        .initialize(&StreamParameters::new(VideoCodec::H264, 1280, 720, 60).with_window(1920, 1440))
        .unwrap();
    let plan = pipeline.plan().unwrap().clone();
    assert_eq!(plan.step1, RenderStep::AllVideoProcessor);
    assert_eq!(plan.step2, RenderStep::None);

    pipeline.render_frame(&locked_frame(0));
    assert_eq!(pipeline.counters().presented, 1);
    assert_eq!(engines(&device), vec![Engine::VideoProcess, Engine::Graphics]);

    let draw = device.executed().pop().unwrap();
    let commands = draw.commands();
    let clear = commands
        .iter()
        .position(|c| matches!(c, GpuCommand::Clear { .. }))
        .unwrap();
    let copy = commands
        .iter()
        .position(|c| matches!(c, GpuCommand::CopyRegion { left: 0, top: 180, .. }))
        .unwrap();
    assert!(clear < copy);
    assert_eq!(device.surface_copies().len(), 1);
    assert_eq!(device.surface_copies()[0].0, SurfaceId(3));
}

#[test]
fn test_nvidia_two_step_pipeline() {
    let device = SoftwareGpuDevice::for_vendor(GpuVendor::Nvidia, "NVIDIA GeForce RTX 4080");
    let mut pipeline = build(&device, RendererSettings::default(), None);
    let plan = pipeline.plan().unwrap().clone();
    assert_eq!((plan.step1, plan.step2), (RenderStep::ConvertShader, RenderStep::UpscaleVsr));
    assert!(device.enabled_vendor_features().contains(&VendorFeature::NvidiaVsr));

    pipeline.render_frame(&locked_frame(0));
    assert_eq!(
        engines(&device),
        vec![Engine::Graphics, Engine::VideoProcess, Engine::Graphics]
    );

    let executed = device.executed();
    let convert = &executed[0].commands();
    assert!(matches!(convert.first(), Some(GpuCommand::Transition { .. })));
    assert!(convert.iter().any(|c| matches!(
        c,
        GpuCommand::Shader {
            pass: ShaderPass::Convert(_),
            ..
        }
    )));
    assert!(matches!(convert.last(), Some(GpuCommand::Transition { .. })));
    assert!(executed[1].commands().iter().any(|c| matches!(
        c,
        GpuCommand::VendorEvaluate {
            backend: "nvidia-rtx",
            scale: true,
            ..
        }
    )));

    assert_eq!(device.allocator_resets(Engine::Graphics), 1);
    assert_eq!(device.allocator_resets(Engine::VideoProcess), 1);
}

#[test]
fn test_amd_runs_on_accelerator_engine() {
    let device = SoftwareGpuDevice::for_vendor(GpuVendor::Amd, "AMD Radeon RX 7800 XT");
    let mut pipeline = build(&device, RendererSettings::default(), None);
    assert_eq!(pipeline.plan().unwrap().step1, RenderStep::AllAmf);

    pipeline.render_frame(&locked_frame(0));
    let executed = device.executed();
    assert_eq!(executed[0].engine(), Engine::Accelerator);
    assert!(executed[0].commands().iter().any(|c| matches!(
        c,
        GpuCommand::VendorEvaluate {
            backend: "amd-amf",
            convert: true,
            scale: true,
            ..
        }
    )));
}

#[test]
fn test_busy_graphics_repeats_previous_frame() {
    let device = SoftwareGpuDevice::new();
    let mut pipeline = build(&device, RendererSettings::default(), None);
    let graphics = device.software_timeline(Engine::Graphics).unwrap();

    graphics.hold();
    pipeline.render_frame(&locked_frame(0));
    assert_eq!(pipeline.counters().presented, 1);

    pipeline.render_frame(&locked_frame(1));
    let counters = pipeline.counters();
    assert_eq!(counters.presented, 1);
    assert_eq!(counters.repeated, 1);
    assert_eq!(device.surface_copies().len(), 1);

    graphics.release();
    pipeline.render_frame(&locked_frame(2));
    assert_eq!(pipeline.counters().presented, 2);
    assert_eq!(device.present_count(), 3);
}

#[test]
fn test_failed_submission_presents_blank_frame() {
    let device = SoftwareGpuDevice::new();
    let mut pipeline = build(&device, RendererSettings::default(), None);

    device.fail_next_execute();
    pipeline.render_frame(&locked_frame(0));
    let counters = pipeline.counters();
    assert_eq!(counters.transient_failures, 1);
    assert_eq!(counters.blank, 1);
    assert_eq!(device.present_count(), 1);

    pipeline.render_frame(&locked_frame(1));
    device.fail_next_execute();
    pipeline.render_frame(&locked_frame(2));
    assert_eq!(pipeline.counters().repeated, 1);
}

#[test]
fn test_device_loss_posts_reset() {
    let device = SoftwareGpuDevice::new();
    let (events, rx) = EventSink::channel();
    let mut pipeline = build(&device, RendererSettings::default(), Some(events));

    device.fail_present_device_lost();
    pipeline.render_frame(&locked_frame(0));
    assert_eq!(pipeline.counters().device_lost, 1);
    assert_eq!(
        rx.try_recv().unwrap(),
        PresentEvent::RenderTargetsReset(ResetReason::DeviceLost)
    );
}

#[test]
fn test_window_and_hdr_changes_post_resets() {
    let device = SoftwareGpuDevice::new();
    let (events, rx) = EventSink::channel();
    let mut pipeline = build(&device, RendererSettings::default(), Some(events));

    pipeline.render_frame(&locked_frame(0));
    assert!(rx.try_recv().is_err());

    device.set_window_size(1280, 720);
    device.set_display_hdr(true);
    pipeline.render_frame(&locked_frame(1));
    assert_eq!(
        rx.try_recv().unwrap(),
        PresentEvent::RenderTargetsReset(ResetReason::WindowResized)
    );
    assert_eq!(
        rx.try_recv().unwrap(),
        PresentEvent::RenderTargetsReset(ResetReason::DisplayHdrChanged)
    );

    pipeline.render_frame(&locked_frame(2));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_tearing_only_without_vsync() {
    let device = SoftwareGpuDevice::new();
    let mut pipeline = build(&device, RendererSettings::default(), None);
    pipeline.render_frame(&locked_frame(0));
    assert!(!device.presents()[0].allow_tearing);

    let device = SoftwareGpuDevice::new();
    let settings = RendererSettings {
        vsync: false,
        allow_tearing: true,
        ..RendererSettings::default()
    };
    let mut pipeline = build(&device, settings, None);
    pipeline.render_frame(&locked_frame(0));
    assert!(device.presents()[0].allow_tearing);
}

#[test]
fn test_colour_conversion_follows_frame_format() {
    let device = SoftwareGpuDevice::for_vendor(GpuVendor::Intel, "Intel Arc A770");
    let mut pipeline = build(&device, RendererSettings::default(), None);
    assert_eq!(pipeline.plan().unwrap().step1, RenderStep::ConvertShader);

    pipeline.render_frame(&locked_frame(0));
    let bt601 = Frame::new(
        1,
        FrameDescriptor::new(1280, 720, PixelFormat::Nv12).with_color_space(ColorSpace::Bt601),
        FrameBacking::LockedCopy {
            surface: SurfaceId(3),
        },
    );
    pipeline.render_frame(&bt601);

    let constants: Vec<_> = device
        .executed()
        .iter()
        .flat_map(|list| list.commands().to_vec())
        .filter_map(|c| match c {
            GpuCommand::Shader {
                pass: ShaderPass::Convert(csc),
                ..
            } => Some(csc),
            _ => None,
        })
        .collect();
    assert_eq!(constants.len(), 2);
    assert_ne!(constants[0], constants[1]);
}

struct DebugOverlay;

impl OverlayProvider for DebugOverlay {
    fn updated_surface(&self, _kind: OverlayKind) -> Option<OverlaySurface> {
        Some(OverlaySurface {
            width: 100,
            height: 20,
            pixels: vec![255; 100 * 20 * 4],
        })
    }

    fn is_enabled(&self, kind: OverlayKind) -> bool {
        kind == OverlayKind::Debug
    }
}

#[test]
fn test_overlays_drawn_and_released() {
    let device = SoftwareGpuDevice::new();
    let mut pipeline = RenderPipeline::new(
        Box::new(device.clone()),
        RendererSettings::default(),
        Some(Arc::new(DebugOverlay)),
        None,
    );
    pipeline.initialize(&params()).unwrap();
    assert_eq!(device.live_overlays(), 1);

    let manager = pipeline.overlay_manager().unwrap();
    manager.notify_overlay_updated(OverlayKind::Debug).unwrap();
    manager.notify_overlay_updated(OverlayKind::StatusUpdate).unwrap();
    assert_eq!(device.live_overlays(), 1);
    drop(manager);

    pipeline.render_frame(&locked_frame(0));
    let draw = device.executed().pop().unwrap();
    assert!(draw.commands().iter().any(|c| matches!(
        c,
        GpuCommand::DrawOverlay {
            top: 0,
            width: 100,
            ..
        }
    )));

    drop(pipeline);
    assert_eq!(device.live_overlays(), 0);
    assert_eq!(device.live_textures(), 0);
}

#[test]
fn test_shared_fence_source_uses_decoder_texture() {
    let device = SoftwareGpuDevice::new();
    let mut pipeline = build(&device, RendererSettings::default(), None);
    pipeline.render_frame(&Frame::new(
        0,
        FrameDescriptor::new(1280, 720, PixelFormat::Nv12),
        FrameBacking::SharedFence {
            surface: SurfaceId(1),
            fence_value: 42,
        },
    ));
    assert!(device.surface_copies().is_empty());
    let waits = device.decoder_queued_waits();
    assert!(waits.contains(&(Engine::VideoProcess, 42)));
    assert!(waits.contains(&(Engine::Graphics, 42)));

    let step = &device.executed()[0];
    let reads_decoder = step.commands().iter().any(|c| match c {
        GpuCommand::VideoProcess { input, .. } => *input != TextureId(0),
        _ => false,
    });
    assert!(reads_decoder);
}
