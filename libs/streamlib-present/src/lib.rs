// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

#![allow(clippy::too_many_arguments)] // Render-step dispatch carries the full texture/fence context
#![allow(clippy::new_without_default)] // Constructors that allocate GPU-side state stay explicit

// Re-export crossbeam_channel so embedders can select on PresentEvent receivers
pub use crossbeam_channel;

pub mod core;
pub mod gpu;

pub use core::config::{EnhancerOverride, PacerConfig, PacingMode, PresentConfig, RendererSettings};
pub use core::events::{EventSink, PresentEvent, ResetReason};
pub use core::frames::{
    ChromaLocation, ColorRange, ColorSpace, Frame, FrameBacking, FrameDescriptor, FramePool,
    PixelFormat, SurfaceId,
};
pub use core::logging::init_logging;
pub use core::pacer::{Pacer, PacerCore, PacerStats, VsyncOutcome};
pub use core::renderer::{Renderer, RendererAttributes, StreamParameters, VideoCodec};
pub use core::vsync::{
    ManualVsyncSource, ThreadedVsyncSource, TimerVsyncSource, VsyncListener, VsyncSignal,
    VsyncSource,
};
pub use core::{InitFailureReason, Result, StreamError};
pub use gpu::{GpuDevice, RenderPipeline, SoftwareGpuDevice};
