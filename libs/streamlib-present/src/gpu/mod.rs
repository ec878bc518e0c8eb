// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! GPU side of presentation: capability detection, render-step selection,
//! engine fences, vendor accelerators, overlays and the render pipeline.

pub mod accelerator;
pub mod capabilities;
pub mod color;
pub mod device;
pub mod fence;
pub mod overlay;
pub mod pipeline;
pub mod render_step;
pub mod selection;
pub mod software;
pub mod texture;

pub use accelerator::{AcceleratorBackend, AcceleratorProbe, accelerator_for};
pub use capabilities::{AdapterInfo, DeviceFeatures, GpuCapabilities, GpuVendor, PowerSource};
pub use device::{CommandList, GpuCommand, GpuDevice, ResourceState, VendorFeature};
pub use fence::{Engine, FenceChannel, FenceTicket, FenceTimeline, SoftwareTimeline};
pub use overlay::{OverlayKind, OverlayManager, OverlayProvider, OverlaySurface, OverlayUploader};
pub use pipeline::{RenderCounters, RenderPipeline};
pub use render_step::{RenderStep, ShaderEnhancer};
pub use selection::{ProbeResults, RenderPlan, SelectionInputs, VsrQuality, resolve_render_plan};
pub use software::{PresentRecord, SoftwareGpuDevice};
pub use texture::{OutputRect, TextureGeometry, TextureId, letterbox};
