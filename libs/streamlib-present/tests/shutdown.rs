// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shutdown from every thread state releases every frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use streamlib_present::core::config::{PacerConfig, RendererSettings};
use streamlib_present::core::frames::{
    Frame, FrameBacking, FrameDescriptor, FramePool, PixelFormat, SurfaceId,
};
use streamlib_present::core::pacer::Pacer;
use streamlib_present::core::renderer::{Renderer, StreamParameters, VideoCodec};
use streamlib_present::core::vsync::{ManualVsyncSource, TimerVsyncSource};
use streamlib_present::gpu::{RenderPipeline, SoftwareGpuDevice};

#[derive(Default)]
struct RenderTrace {
    rendered: AtomicU64,
    in_render: AtomicBool,
    cleaned_up: AtomicBool,
}

struct SlowRenderer {
    trace: Arc<RenderTrace>,
    delay: Duration,
}

impl Renderer for SlowRenderer {
    fn initialize(&mut self, _params: &StreamParameters) -> streamlib_present::Result<()> {
        Ok(())
    }

    fn render_frame(&mut self, _frame: &Frame) {
        self.trace.in_render.store(true, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.trace.rendered.fetch_add(1, Ordering::SeqCst);
        self.trace.in_render.store(false, Ordering::SeqCst);
    }

    fn cleanup_render_context(&mut self) {
        self.trace.cleaned_up.store(true, Ordering::SeqCst);
    }
}

fn pooled_frame(pool: &FramePool, seq: u64) -> Frame {
    let slot = pool.acquire().unwrap();
    let surface = SurfaceId(slot.index());
    Frame::new(
        seq,
        FrameDescriptor::new(1280, 720, PixelFormat::Nv12),
        FrameBacking::LockedCopy { surface },
    )
    .with_slot(slot)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[test]
fn test_shutdown_while_waiting_on_vsync_and_render_queue() {
    let trace = Arc::new(RenderTrace::default());
    let renderer = SlowRenderer {
        trace: Arc::clone(&trace),
        delay: Duration::ZERO,
    };
    let pool = FramePool::new(PacerConfig::default().max_outstanding_frames());

    // Never ticked: the vsync thread sits in its timed wait.
    let vsync = ManualVsyncSource::new(Some(60));
    let mut pacer = Pacer::initialize(
        PacerConfig::default(),
        Box::new(renderer),
        Some(Box::new(vsync)),
        None,
    )
    .unwrap();
    assert!(pacer.is_vsync_paced());

    for seq in 0..3 {
        pacer.submit_frame(pooled_frame(&pool, seq));
    }
    assert_eq!(pool.stats().in_use, 3);

    pacer.shutdown();
    assert_eq!(pool.stats().in_use, 0);
    assert!(trace.cleaned_up.load(Ordering::SeqCst));
}

#[test]
fn test_shutdown_mid_render() {
    let trace = Arc::new(RenderTrace::default());
    let renderer = SlowRenderer {
        trace: Arc::clone(&trace),
        delay: Duration::from_millis(30),
    };
    let pool = FramePool::new(8);
    let config = PacerConfig {
        enable_pacing: false,
        ..PacerConfig::default()
    };
    let mut pacer = Pacer::initialize(config, Box::new(renderer), None, None).unwrap();

    for seq in 0..4 {
        pacer.submit_frame(pooled_frame(&pool, seq));
    }
    assert!(wait_until(Duration::from_secs(2), || trace
        .in_render
        .load(Ordering::SeqCst)));

    pacer.shutdown();
    assert!(!trace.in_render.load(Ordering::SeqCst));
    assert_eq!(pool.stats().in_use, 0);
    assert!(trace.cleaned_up.load(Ordering::SeqCst));
}

#[test]
fn test_shutdown_is_idempotent_and_drop_safe() {
    let trace = Arc::new(RenderTrace::default());
    let renderer = SlowRenderer {
        trace: Arc::clone(&trace),
        delay: Duration::ZERO,
    };
    let pool = FramePool::new(4);
    let mut pacer = Pacer::initialize(
        PacerConfig::default(),
        Box::new(renderer),
        Some(Box::new(TimerVsyncSource::new(120))),
        None,
    )
    .unwrap();

    pacer.submit_frame(pooled_frame(&pool, 0));
    pacer.shutdown();
    pacer.shutdown();
    drop(pacer);
    assert_eq!(pool.stats().in_use, 0);
}

#[test]
fn test_paced_pipeline_end_to_end() {
    let device = SoftwareGpuDevice::new();
    let mut pipeline = RenderPipeline::new(
        Box::new(device.clone()),
        RendererSettings::default(),
        None,
        None,
    );
    pipeline
        .initialize(&StreamParameters::new(VideoCodec::H264, 1280, 720, 60).with_window(1920, 1080))
        .unwrap();

    let pool = FramePool::new(PacerConfig::default().max_outstanding_frames());
    let mut pacer = Pacer::initialize(
        PacerConfig::default(),
        Box::new(pipeline),
        Some(Box::new(TimerVsyncSource::new(240))),
        None,
    )
    .unwrap();

    for seq in 0..20 {
        pacer.submit_frame(pooled_frame(&pool, seq));
        std::thread::sleep(Duration::from_millis(4));
    }
    assert!(wait_until(Duration::from_secs(2), || pacer.stats().rendered_frames > 0));

    pacer.shutdown();
    let stats = pacer.stats();
    assert_eq!(stats.submitted_frames, 20);
    assert!(stats.rendered_frames + stats.dropped_frames <= 20);
    assert!(device.present_count() as u64 >= stats.rendered_frames);
    assert_eq!(pool.stats().in_use, 0);

    // The pacer owns the pipeline; dropping it releases the GPU textures.
    drop(pacer);
    assert_eq!(device.live_textures(), 0);
}
