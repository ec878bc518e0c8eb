// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! CPU reference implementation of [`GpuDevice`].
//!
//! Records every submitted command list and present, completes fences on
//! [`SoftwareTimeline`]s and lets callers inject failures. Clones share the
//! same state, so a test can keep a handle after boxing one into a pipeline.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::capabilities::{AdapterInfo, DeviceFeatures, GpuVendor, PowerSource};
use super::device::{CommandList, GpuDevice, VendorFeature, VideoProcessorQuery};
use super::fence::{Engine, FenceTimeline, SoftwareTimeline};
use super::overlay::{OverlaySurface, OverlayUploader};
use super::texture::{TextureDescriptor, TextureId};
use crate::core::frames::SurfaceId;
use crate::core::{Result, StreamError};

const BACK_BUFFER_BASE: u64 = 1 << 40;
const DECODER_SURFACE_BASE: u64 = 1 << 41;
const BACK_BUFFER_COUNT: u64 = 2;

const ENGINES: [Engine; 5] = [
    Engine::VideoProcess,
    Engine::Graphics,
    Engine::Overlay,
    Engine::Accelerator,
    Engine::Decoder,
];

/// One recorded `present` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentRecord {
    pub back_buffer: TextureId,
    pub sync_interval: u32,
    pub allow_tearing: bool,
}

struct DeviceState {
    adapter: AdapterInfo,
    features: DeviceFeatures,
    power: PowerSource,
    vp_convert: bool,
    vp_scaling: bool,
    unsupported_vendor_features: HashSet<VendorFeature>,
    enabled_vendor_features: HashSet<VendorFeature>,
    fail_vendor_activation: bool,
    fail_next_execute: bool,
    fail_present_device_lost: bool,
    textures: HashMap<TextureId, TextureDescriptor>,
    executed: Vec<CommandList>,
    presents: Vec<PresentRecord>,
    surface_copies: Vec<(SurfaceId, TextureId)>,
    allocator_resets: HashMap<Engine, u64>,
    window: (u32, u32),
    display_hdr: bool,
}

struct Shared {
    state: Mutex<DeviceState>,
    next_id: AtomicU64,
    timelines: HashMap<Engine, Arc<SoftwareTimeline>>,
    decoder_timeline: Arc<SoftwareTimeline>,
    decoder_lock: Arc<Mutex<()>>,
    overlays: Mutex<HashSet<TextureId>>,
}

impl Shared {
    fn next_texture_id(&self) -> TextureId {
        TextureId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[derive(Clone)]
pub struct SoftwareGpuDevice {
    shared: Arc<Shared>,
}

impl SoftwareGpuDevice {
    /// A generic adapter with every feature available and a 1920x1080 window.
    pub fn new() -> Self {
        Self::with_adapter(AdapterInfo {
            vendor_id: 0x1414,
            name: "Software Adapter".into(),
            dedicated_video_memory: 0,
            shared_system_memory: 0,
        })
    }

    pub fn with_adapter(adapter: AdapterInfo) -> Self {
        let timelines = ENGINES
            .iter()
            .map(|&engine| (engine, Arc::new(SoftwareTimeline::new())))
            .collect();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DeviceState {
                    adapter,
                    features: DeviceFeatures::default(),
                    power: PowerSource::Ac,
                    vp_convert: true,
                    vp_scaling: true,
                    unsupported_vendor_features: HashSet::new(),
                    enabled_vendor_features: HashSet::new(),
                    fail_vendor_activation: false,
                    fail_next_execute: false,
                    fail_present_device_lost: false,
                    textures: HashMap::new(),
                    executed: Vec::new(),
                    presents: Vec::new(),
                    surface_copies: Vec::new(),
                    allocator_resets: HashMap::new(),
                    window: (1920, 1080),
                    display_hdr: false,
                }),
                next_id: AtomicU64::new(0),
                timelines,
                decoder_timeline: Arc::new(SoftwareTimeline::new()),
                decoder_lock: Arc::new(Mutex::new(())),
                overlays: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Adapter for a well-known vendor with typical discrete memory sizes.
    pub fn for_vendor(vendor: GpuVendor, name: &str) -> Self {
        Self::with_adapter(AdapterInfo {
            vendor_id: vendor.pci_id(),
            name: name.to_string(),
            dedicated_video_memory: 8 << 30,
            shared_system_memory: 16 << 30,
        })
    }

    pub fn set_features(&self, features: DeviceFeatures) {
        self.shared.state.lock().features = features;
    }

    pub fn set_power_source(&self, power: PowerSource) {
        self.shared.state.lock().power = power;
    }

    /// Video-processor support for conversion and for scaling queries.
    pub fn set_video_processor_support(&self, convert: bool, scaling: bool) {
        let mut state = self.shared.state.lock();
        state.vp_convert = convert;
        state.vp_scaling = scaling;
    }

    pub fn set_vendor_feature_supported(&self, feature: VendorFeature, supported: bool) {
        let mut state = self.shared.state.lock();
        if supported {
            state.unsupported_vendor_features.remove(&feature);
        } else {
            state.unsupported_vendor_features.insert(feature);
        }
    }

    /// Make enabling any vendor feature fail.
    pub fn fail_vendor_activation(&self, fail: bool) {
        self.shared.state.lock().fail_vendor_activation = fail;
    }

    /// Fail the next `execute` call once.
    pub fn fail_next_execute(&self) {
        self.shared.state.lock().fail_next_execute = true;
    }

    /// Report device removal on the next `present`.
    pub fn fail_present_device_lost(&self) {
        self.shared.state.lock().fail_present_device_lost = true;
    }

    pub fn set_window_size(&self, width: u32, height: u32) {
        self.shared.state.lock().window = (width, height);
    }

    pub fn set_display_hdr(&self, enabled: bool) {
        self.shared.state.lock().display_hdr = enabled;
    }

    /// Concrete timeline for an engine, for holding and releasing completion.
    pub fn software_timeline(&self, engine: Engine) -> Option<Arc<SoftwareTimeline>> {
        self.shared.timelines.get(&engine).cloned()
    }

    pub fn executed(&self) -> Vec<CommandList> {
        self.shared.state.lock().executed.clone()
    }

    pub fn presents(&self) -> Vec<PresentRecord> {
        self.shared.state.lock().presents.clone()
    }

    pub fn present_count(&self) -> usize {
        self.shared.state.lock().presents.len()
    }

    pub fn surface_copies(&self) -> Vec<(SurfaceId, TextureId)> {
        self.shared.state.lock().surface_copies.clone()
    }

    pub fn allocator_resets(&self, engine: Engine) -> u64 {
        self.shared
            .state
            .lock()
            .allocator_resets
            .get(&engine)
            .copied()
            .unwrap_or(0)
    }

    pub fn live_textures(&self) -> usize {
        self.shared.state.lock().textures.len()
    }

    pub fn texture_descriptor(&self, texture: TextureId) -> Option<TextureDescriptor> {
        self.shared.state.lock().textures.get(&texture).cloned()
    }

    pub fn enabled_vendor_features(&self) -> Vec<VendorFeature> {
        self.shared
            .state
            .lock()
            .enabled_vendor_features
            .iter()
            .copied()
            .collect()
    }

    pub fn live_overlays(&self) -> usize {
        self.shared.overlays.lock().len()
    }

    /// Waits queued against the decoder's shared-surface timeline.
    pub fn decoder_queued_waits(&self) -> Vec<(Engine, u64)> {
        self.shared.decoder_timeline.queued_waits()
    }
}

impl Default for SoftwareGpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SoftwareGpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SoftwareGpuDevice")
            .field("adapter", &state.adapter.name)
            .field("textures", &state.textures.len())
            .field("executed", &state.executed.len())
            .field("presents", &state.presents.len())
            .finish()
    }
}

impl GpuDevice for SoftwareGpuDevice {
    fn adapter_info(&self) -> AdapterInfo {
        self.shared.state.lock().adapter.clone()
    }

    fn features(&self) -> DeviceFeatures {
        self.shared.state.lock().features
    }

    fn power_source(&self) -> PowerSource {
        self.shared.state.lock().power
    }

    fn supports_video_processor(&self, query: &VideoProcessorQuery) -> bool {
        let state = self.shared.state.lock();
        let scaling =
            query.input_width != query.output_width || query.input_height != query.output_height;
        if scaling {
            state.vp_convert && state.vp_scaling
        } else {
            state.vp_convert
        }
    }

    fn supports_vendor_feature(&self, feature: VendorFeature) -> bool {
        !self
            .shared
            .state
            .lock()
            .unsupported_vendor_features
            .contains(&feature)
    }

    fn set_vendor_feature(&mut self, feature: VendorFeature, enable: bool) -> Result<()> {
        let mut state = self.shared.state.lock();
        if !enable {
            state.enabled_vendor_features.remove(&feature);
            return Ok(());
        }
        if state.fail_vendor_activation || state.unsupported_vendor_features.contains(&feature) {
            return Err(StreamError::NotSupported(format!("{:?} refused by the driver", feature)));
        }
        state.enabled_vendor_features.insert(feature);
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId> {
        if desc.width == 0 || desc.height == 0 {
            return Err(StreamError::Runtime(format!(
                "{} texture has zero size",
                desc.label
            )));
        }
        let id = self.shared.next_texture_id();
        self.shared.state.lock().textures.insert(id, desc.clone());
        Ok(id)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.shared.state.lock().textures.remove(&texture).is_none() {
            tracing::debug!("Destroying unknown texture {:?}", texture);
        }
    }

    fn source_texture(&mut self, surface: SurfaceId) -> Result<TextureId> {
        Ok(TextureId(DECODER_SURFACE_BASE + u64::from(surface.0)))
    }

    fn copy_decoder_surface(&mut self, surface: SurfaceId, dst: TextureId) -> Result<()> {
        let mut state = self.shared.state.lock();
        if !state.textures.contains_key(&dst) {
            return Err(StreamError::Runtime(format!(
                "copy into unknown texture {:?}",
                dst
            )));
        }
        state.surface_copies.push((surface, dst));
        Ok(())
    }

    fn decoder_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.shared.decoder_lock)
    }

    fn execute(&mut self, list: CommandList) -> Result<()> {
        let mut state = self.shared.state.lock();
        if std::mem::take(&mut state.fail_next_execute) {
            return Err(StreamError::GpuSubmission(format!(
                "{} command list failed to close",
                list.engine()
            )));
        }
        state.executed.push(list);
        Ok(())
    }

    fn timeline(&self, engine: Engine) -> Arc<dyn FenceTimeline> {
        match self.shared.timelines.get(&engine) {
            Some(timeline) => Arc::clone(timeline) as Arc<dyn FenceTimeline>,
            // Every engine has a timeline; this arm only satisfies the map lookup.
            None => Arc::new(SoftwareTimeline::new()),
        }
    }

    fn decoder_timeline(&self) -> Arc<dyn FenceTimeline> {
        Arc::clone(&self.shared.decoder_timeline) as Arc<dyn FenceTimeline>
    }

    fn back_buffer(&mut self) -> Result<TextureId> {
        let index = self.shared.state.lock().presents.len() as u64 % BACK_BUFFER_COUNT;
        Ok(TextureId(BACK_BUFFER_BASE + index))
    }

    fn present(&mut self, sync_interval: u32, allow_tearing: bool) -> Result<()> {
        let mut state = self.shared.state.lock();
        if std::mem::take(&mut state.fail_present_device_lost) {
            return Err(StreamError::DeviceLost("device removed during present".into()));
        }
        let index = state.presents.len() as u64 % BACK_BUFFER_COUNT;
        state.presents.push(PresentRecord {
            back_buffer: TextureId(BACK_BUFFER_BASE + index),
            sync_interval,
            allow_tearing,
        });
        Ok(())
    }

    fn reset_command_allocator(&mut self, engine: Engine) -> Result<()> {
        *self
            .shared
            .state
            .lock()
            .allocator_resets
            .entry(engine)
            .or_insert(0) += 1;
        Ok(())
    }

    fn wait_frame_latency(&mut self, _timeout: Duration) -> bool {
        true
    }

    fn window_size(&self) -> (u32, u32) {
        self.shared.state.lock().window
    }

    fn display_hdr_enabled(&self) -> bool {
        self.shared.state.lock().display_hdr
    }

    fn overlay_uploader(&self) -> Arc<dyn OverlayUploader> {
        Arc::new(SoftwareOverlayUploader {
            shared: Arc::clone(&self.shared),
        })
    }
}

struct SoftwareOverlayUploader {
    shared: Arc<Shared>,
}

impl OverlayUploader for SoftwareOverlayUploader {
    fn upload(&self, surface: &OverlaySurface) -> Result<TextureId> {
        let expected = surface.width as usize * surface.height as usize * 4;
        if surface.pixels.len() < expected {
            return Err(StreamError::Runtime(format!(
                "overlay surface holds {} bytes, {}x{} needs {}",
                surface.pixels.len(),
                surface.width,
                surface.height,
                expected
            )));
        }
        let id = self.shared.next_texture_id();
        self.shared.overlays.lock().insert(id);
        Ok(id)
    }

    fn release(&self, texture: TextureId) {
        self.shared.overlays.lock().remove(&texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::texture::TextureFormat;

    #[test]
    fn test_clones_share_state() {
        let device = SoftwareGpuDevice::new();
        let mut boxed: Box<dyn GpuDevice> = Box::new(device.clone());
        let id = boxed
            .create_texture(&TextureDescriptor::new("t", 4, 4, TextureFormat::Rgba8Unorm))
            .unwrap();
        assert_eq!(device.live_textures(), 1);
        boxed.destroy_texture(id);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn test_injected_failures_fire_once() {
        let mut device = SoftwareGpuDevice::new();
        device.fail_next_execute();
        assert!(device.execute(CommandList::new(Engine::Graphics)).is_err());
        assert!(device.execute(CommandList::new(Engine::Graphics)).is_ok());

        device.fail_present_device_lost();
        assert!(matches!(device.present(0, false), Err(StreamError::DeviceLost(_))));
        assert!(device.present(0, false).is_ok());
        assert_eq!(device.present_count(), 1);
    }

    #[test]
    fn test_back_buffers_alternate() {
        let mut device = SoftwareGpuDevice::new();
        let first = device.back_buffer().unwrap();
        device.present(0, false).unwrap();
        let second = device.back_buffer().unwrap();
        device.present(0, false).unwrap();
        assert_ne!(first, second);
        assert_eq!(device.back_buffer().unwrap(), first);
    }

    #[test]
    fn test_video_processor_scaling_support() {
        let device = SoftwareGpuDevice::new();
        let query = VideoProcessorQuery {
            input_format: TextureFormat::Nv12,
            input_width: 1280,
            input_height: 720,
            output_format: TextureFormat::Rgba8Unorm,
            output_width: 1920,
            output_height: 1080,
        };
        assert!(device.supports_video_processor(&query));
        device.set_video_processor_support(true, false);
        assert!(!device.supports_video_processor(&query));
        assert!(device.supports_video_processor(&VideoProcessorQuery {
            output_width: 1280,
            output_height: 720,
            ..query
        }));
    }
}
