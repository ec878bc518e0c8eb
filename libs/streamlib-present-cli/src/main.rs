// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! present-sim
//!
//! Drives the frame pacer with a synthetic decoder and renders through the
//! software GPU device, then prints session statistics as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use serde::Serialize;
use streamlib_present::core::frames::{FramePoolConfig, FramePoolExhaustionPolicy};
use streamlib_present::gpu::GpuVendor;
use streamlib_present::{
    EventSink, Frame, FrameBacking, FrameDescriptor, FramePool, Pacer, PacerCore, PacerStats,
    PacingMode, PixelFormat, PresentConfig, PresentEvent, RenderPipeline, Renderer,
    SoftwareGpuDevice, StreamParameters, SurfaceId, ThreadedVsyncSource, TimerVsyncSource,
    VideoCodec, VsyncSource,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Vendor {
    Amd,
    Intel,
    Nvidia,
    Generic,
}

#[derive(Parser)]
#[command(name = "present-sim")]
#[command(author, version, about = "Simulate frame pacing and GPU presentation", long_about = None)]
struct Cli {
    /// Pacing mode (balanced, low-latency, ultra-low-latency). Falls back to STREAMLIB_PACING_MODE.
    #[arg(long)]
    mode: Option<PacingMode>,

    /// Synthetic decoder frame rate
    #[arg(long, default_value = "60")]
    decode_fps: u32,

    /// Display refresh rate
    #[arg(long, default_value = "60")]
    display_hz: u32,

    /// Simulation length in seconds
    #[arg(long, default_value = "5")]
    seconds: u64,

    /// Simulated GPU vendor
    #[arg(long, value_enum, default_value = "generic")]
    vendor: Vendor,

    /// Stream width
    #[arg(long, default_value = "1920")]
    width: u32,

    /// Stream height
    #[arg(long, default_value = "1080")]
    height: u32,

    /// Deliver vsync from a ticker thread instead of a blocking timer
    #[arg(long)]
    async_vsync: bool,

    /// Bypass vsync pacing
    #[arg(long)]
    no_pacing: bool,

    /// present.toml to load
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct Summary {
    mode: String,
    plan: String,
    decoded_frames: u64,
    decoder_stalls: u64,
    presents: usize,
    pacer: PacerStats,
    drop_ratio: f64,
    average_pacer_ms: Option<f64>,
    average_render_ms: Option<f64>,
}

fn device_for(vendor: Vendor) -> SoftwareGpuDevice {
    match vendor {
        Vendor::Amd => SoftwareGpuDevice::for_vendor(GpuVendor::Amd, "AMD Radeon RX 7800 XT"),
        Vendor::Intel => SoftwareGpuDevice::for_vendor(GpuVendor::Intel, "Intel Arc A770"),
        Vendor::Nvidia => {
            SoftwareGpuDevice::for_vendor(GpuVendor::Nvidia, "NVIDIA GeForce RTX 4070")
        }
        Vendor::Generic => SoftwareGpuDevice::new(),
    }
}

struct Decoder {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
    decoded: Arc<AtomicU64>,
    stalls: Arc<AtomicU64>,
}

fn spawn_decoder(
    pacer: Arc<PacerCore>,
    pool: FramePool,
    fps: u32,
    width: u32,
    height: u32,
) -> Result<Decoder> {
    let running = Arc::new(AtomicBool::new(true));
    let decoded = Arc::new(AtomicU64::new(0));
    let stalls = Arc::new(AtomicU64::new(0));
    let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));

    let handle = {
        let running = Arc::clone(&running);
        let decoded = Arc::clone(&decoded);
        let stalls = Arc::clone(&stalls);
        std::thread::Builder::new()
            .name("synthetic-decoder".into())
            .spawn(move || {
                let descriptor = FrameDescriptor::new(width, height, PixelFormat::Nv12);
                let mut next = Instant::now();
                let mut sequence = 0u64;
                while running.load(Ordering::Acquire) {
                    next += period;
                    if let Some(wait) = next.checked_duration_since(Instant::now()) {
                        std::thread::sleep(wait);
                    }

                    let slot = match pool.acquire() {
                        Ok(slot) => slot,
                        Err(e) => {
                            stalls.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!("Decoder stalled: {}", e);
                            continue;
                        }
                    };
                    let frame = Frame::new(
                        sequence,
                        descriptor,
                        FrameBacking::LockedCopy {
                            surface: SurfaceId(slot.index()),
                        },
                    )
                    .with_slot(slot);
                    pacer.submit_frame(frame);
                    sequence += 1;
                    decoded.fetch_add(1, Ordering::Relaxed);
                }
            })
            .context("Failed to spawn decoder thread")?
    };

    Ok(Decoder {
        handle,
        running,
        decoded,
        stalls,
    })
}

fn main() -> Result<()> {
    streamlib_present::init_logging("info").context("Failed to initialize logging")?;
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PresentConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => PresentConfig::default(),
    };
    config.pacer.mode = match cli.mode {
        Some(mode) => mode,
        None if cli.config.is_some() => config.pacer.mode,
        None => PacingMode::resolve(None),
    };
    config.pacer.max_video_fps = cli.decode_fps;
    config.pacer.display_fps = cli.display_hz;
    if cli.no_pacing {
        config.pacer.enable_pacing = false;
    }

    let device = device_for(cli.vendor);
    let (events, rx) = EventSink::channel();
    let mut pipeline = RenderPipeline::new(
        Box::new(device.clone()),
        config.renderer.clone(),
        None,
        Some(events.clone()),
    );
    let params = StreamParameters::new(VideoCodec::Hevc, cli.width, cli.height, cli.decode_fps)
        .with_window(1920, 1080);
    pipeline
        .initialize(&params)
        .context("Render pipeline initialization failed")?;
    let plan = pipeline
        .plan()
        .map(ToString::to_string)
        .unwrap_or_default();

    let vsync: Box<dyn VsyncSource> = if cli.async_vsync {
        Box::new(ThreadedVsyncSource::new(cli.display_hz))
    } else {
        Box::new(TimerVsyncSource::new(cli.display_hz))
    };

    let pool = FramePool::with_config(FramePoolConfig {
        capacity: config.pacer.max_outstanding_frames(),
        exhaustion_policy: FramePoolExhaustionPolicy::Block { timeout_ms: 100 },
    });
    let mode = config.pacer.mode;
    let mut pacer =
        Pacer::initialize(config.pacer, Box::new(pipeline), Some(vsync), Some(events))
            .context("Pacer initialization failed")?;
    let decoder = spawn_decoder(
        Arc::clone(pacer.core()),
        pool.clone(),
        cli.decode_fps,
        cli.width,
        cli.height,
    )?;

    let deadline = Instant::now() + Duration::from_secs(cli.seconds);
    loop {
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            break;
        };
        match rx.recv_timeout(remaining) {
            Ok(PresentEvent::RenderFrameReady) => {
                pacer.render_on_main_thread();
            }
            Ok(PresentEvent::RenderTargetsReset(reason)) => {
                tracing::warn!("Renderer reset requested ({:?}), ending simulation", reason);
                break;
            }
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    decoder.running.store(false, Ordering::Release);
    if decoder.handle.join().is_err() {
        tracing::error!("Decoder thread panicked");
    }

    pacer.shutdown();
    let stats = pacer.stats();
    drop(pacer);

    let in_use = pool.stats().in_use;
    if in_use != 0 {
        tracing::warn!("{} decoder surfaces still referenced after shutdown", in_use);
    }

    let summary = Summary {
        mode: mode.to_string(),
        plan,
        decoded_frames: decoder.decoded.load(Ordering::Relaxed),
        decoder_stalls: decoder.stalls.load(Ordering::Relaxed),
        presents: device.present_count(),
        drop_ratio: stats.drop_ratio(),
        average_pacer_ms: stats.average_pacer_time().map(|d| d.as_secs_f64() * 1000.0),
        average_render_ms: stats.average_render_time().map(|d| d.as_secs_f64() * 1000.0),
        pacer: stats,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
