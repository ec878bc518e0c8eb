// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Adapter identity and the capability value derived from it.
//!
//! [`GpuCapabilities`] is built once per renderer initialization and passed
//! by reference to everything that needs it. Nothing here is global.

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Shared memory at or above this with little dedicated memory marks an iGPU.
const INTEGRATED_MIN_SHARED: u64 = 512 * MIB;
const INTEGRATED_MAX_DEDICATED: u64 = 2 * GIB;
const LOW_END_MAX_DEDICATED: u64 = 4 * GIB;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Amd,
    Intel,
    Nvidia,
    Other(u32),
}

impl GpuVendor {
    pub const AMD_PCI_ID: u32 = 0x1002;
    pub const INTEL_PCI_ID: u32 = 0x8086;
    pub const NVIDIA_PCI_ID: u32 = 0x10DE;

    pub fn from_pci_id(vendor_id: u32) -> Self {
        match vendor_id {
            Self::AMD_PCI_ID => Self::Amd,
            Self::INTEL_PCI_ID => Self::Intel,
            Self::NVIDIA_PCI_ID => Self::Nvidia,
            other => Self::Other(other),
        }
    }

    pub fn pci_id(&self) -> u32 {
        match self {
            Self::Amd => Self::AMD_PCI_ID,
            Self::Intel => Self::INTEL_PCI_ID,
            Self::Nvidia => Self::NVIDIA_PCI_ID,
            Self::Other(id) => *id,
        }
    }
}

impl std::fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Amd => f.write_str("AMD"),
            Self::Intel => f.write_str("Intel"),
            Self::Nvidia => f.write_str("NVIDIA"),
            Self::Other(id) => write!(f, "vendor {:#06x}", id),
        }
    }
}

/// What the adapter reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub vendor_id: u32,
    pub name: String,
    pub dedicated_video_memory: u64,
    pub shared_system_memory: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerSource {
    #[default]
    Ac,
    Battery,
}

/// Feature levels queried from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFeatures {
    /// Needed by the FSR1 / NIS / RCAS shaders.
    pub shader_model_6_2: bool,
    pub mesh_shader_tier1: bool,
    pub tearing_supported: bool,
}

impl Default for DeviceFeatures {
    fn default() -> Self {
        Self {
            shader_model_6_2: true,
            mesh_shader_tier1: false,
            tearing_supported: true,
        }
    }
}

/// Immutable description of the selected adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuCapabilities {
    pub vendor: GpuVendor,
    pub adapter_name: String,
    pub integrated: bool,
    pub low_end: bool,
    pub on_battery: bool,
    pub shader_model_6_2: bool,
    pub mesh_shader_tier1: bool,
    pub tearing_supported: bool,
    /// NVIDIA RTX Video Super Resolution can run on this adapter.
    pub vsr_eligible: bool,
}

impl GpuCapabilities {
    pub fn from_adapter(info: &AdapterInfo, features: DeviceFeatures, power: PowerSource) -> Self {
        let vendor = GpuVendor::from_pci_id(info.vendor_id);
        let integrated = info.shared_system_memory >= INTEGRATED_MIN_SHARED
            && info.dedicated_video_memory <= INTEGRATED_MAX_DEDICATED;
        let low_end = info.dedicated_video_memory <= LOW_END_MAX_DEDICATED;

        // RTX parts are named "... RTX ..."; Turing and newer also expose mesh shaders.
        let vsr_eligible = vendor == GpuVendor::Nvidia
            && (info.name.to_ascii_uppercase().contains(" RTX ") || features.mesh_shader_tier1);

        let caps = Self {
            vendor,
            adapter_name: info.name.clone(),
            integrated,
            low_end,
            on_battery: power == PowerSource::Battery,
            shader_model_6_2: features.shader_model_6_2,
            mesh_shader_tier1: features.mesh_shader_tier1,
            tearing_supported: features.tearing_supported,
            vsr_eligible,
        };

        tracing::info!(
            "GPU: {} ({}), {}{}{}",
            caps.adapter_name,
            caps.vendor,
            if caps.integrated { "integrated" } else { "discrete" },
            if caps.low_end { ", low-end" } else { "" },
            if caps.on_battery { ", on battery" } else { "" }
        );
        caps
    }
}
