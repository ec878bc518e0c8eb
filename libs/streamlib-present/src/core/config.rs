// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Presentation configuration.
//!
//! Two independent halves:
//! 1. **Pacer**: latency mode, frame rates and the overload-relaxation policy
//! 2. **Renderer**: vsync/tearing, enhancement override and display HDR state
//!
//! The pacing mode can be selected at runtime via:
//! 1. Explicit value passed to [`PacingMode::resolve`]
//! 2. `STREAMLIB_PACING_MODE` environment variable
//! 3. Default (`balanced`)
//!
//! The relaxation thresholds are empirically tuned. They are exposed as policy
//! parameters so deployments can retune them without code changes.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{Result, StreamError};

/// Latency/smoothness trade-off for the frame queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingMode {
    /// Up to three queued frames, never relaxes.
    #[default]
    Balanced,
    LowLatency,
    /// A single queued frame. Most sensitive to bursts.
    UltraLowLatency,
}

impl PacingMode {
    /// Environment variable name for mode override.
    pub const ENV_VAR: &'static str = "STREAMLIB_PACING_MODE";

    /// Resolve the mode to use.
    ///
    /// Resolution priority:
    /// 1. Explicit value (if provided)
    /// 2. `STREAMLIB_PACING_MODE` environment variable
    /// 3. [`PacingMode::Balanced`]
    pub fn resolve(explicit: Option<Self>) -> Self {
        if let Some(mode) = explicit {
            return mode;
        }

        if let Ok(env_value) = std::env::var(Self::ENV_VAR) {
            match env_value.parse() {
                Ok(mode) => return mode,
                Err(e) => tracing::warn!("Ignoring {}: {}", Self::ENV_VAR, e),
            }
        }

        Self::default()
    }

    /// Base queue capacity in this mode.
    pub fn max_queued_frames(&self) -> usize {
        match self {
            Self::Balanced => 3,
            Self::LowLatency => 2,
            Self::UltraLowLatency => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::LowLatency => "low-latency",
            Self::UltraLowLatency => "ultra-low-latency",
        }
    }
}

impl FromStr for PacingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "balanced" => Ok(Self::Balanced),
            "low-latency" | "low" => Ok(Self::LowLatency),
            "ultra-low-latency" | "ultra-low" | "ultra" => Ok(Self::UltraLowLatency),
            _ => Err(format!(
                "Unknown pacing mode '{}'. Valid values: balanced, low-latency, ultra-low-latency",
                s
            )),
        }
    }
}

impl std::fmt::Display for PacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Overload-relaxation policy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxationConfig {
    /// Consecutive overflowing enqueues before relaxing (low-latency).
    pub overflow_threshold: u32,
    /// Same, for ultra-low-latency.
    pub ultra_low_overflow_threshold: u32,
    /// Accepted submissions the relaxed state lasts (low-latency).
    pub duration_frames: u32,
    /// Same, for ultra-low-latency.
    pub ultra_low_duration_frames: u32,
    /// Consecutive healthy enqueues that clear the overflow streak.
    pub healthy_reset_frames: u32,
    /// Decoder backlog depth counted as congested.
    pub decoder_backlog_threshold: u32,
    /// Consecutive congested backlog reports before relaxing.
    pub decoder_backlog_streak: u32,
}

impl Default for RelaxationConfig {
    fn default() -> Self {
        Self {
            overflow_threshold: 24,
            ultra_low_overflow_threshold: 8,
            duration_frames: 180,
            ultra_low_duration_frames: 300,
            healthy_reset_frames: 120,
            decoder_backlog_threshold: 10,
            decoder_backlog_streak: 8,
        }
    }
}

impl RelaxationConfig {
    pub fn overflow_threshold_for(&self, mode: PacingMode) -> u32 {
        match mode {
            PacingMode::UltraLowLatency => self.ultra_low_overflow_threshold,
            _ => self.overflow_threshold,
        }
    }

    pub fn duration_for(&self, mode: PacingMode) -> u32 {
        match mode {
            PacingMode::UltraLowLatency => self.ultra_low_duration_frames,
            _ => self.duration_frames,
        }
    }
}

/// Pacer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    pub mode: PacingMode,
    /// Gate rendering on vsync ticks. Without it frames go straight to the render queue.
    pub enable_pacing: bool,
    /// Highest frame rate the stream may deliver.
    pub max_video_fps: u32,
    /// Display refresh rate, used when the vsync source does not report one.
    pub display_fps: u32,
    /// Wake-up margin before the next vsync when waiting for a frame.
    pub vsync_slack_ms: u64,
    /// Upper bound on waiting for an asynchronous vsync signal.
    pub async_vsync_timeout_ms: u64,
    /// Pacing-queue drop target while the history shows a recently starved queue.
    pub lenient_pacing_target: usize,
    /// Render-queue drop target while the history shows a recently empty queue.
    pub lenient_render_target: usize,
    pub relaxation: RelaxationConfig,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            mode: PacingMode::Balanced,
            enable_pacing: true,
            max_video_fps: 60,
            display_fps: 60,
            vsync_slack_ms: 3,
            async_vsync_timeout_ms: 100,
            lenient_pacing_target: 3,
            lenient_render_target: 2,
            relaxation: RelaxationConfig::default(),
        }
    }
}

impl PacerConfig {
    /// Low-latency preset.
    pub fn low_latency() -> Self {
        Self {
            mode: PacingMode::LowLatency,
            ..Default::default()
        }
    }

    /// Ultra-low-latency preset.
    pub fn ultra_low_latency() -> Self {
        Self {
            mode: PacingMode::UltraLowLatency,
            ..Default::default()
        }
    }

    /// Frames the decoder's buffer pool must hold so the queues never stall it.
    pub fn max_outstanding_frames(&self) -> usize {
        PacingMode::Balanced.max_queued_frames() + 2
    }

    /// Vsync period in whole milliseconds.
    pub fn vsync_period_ms(&self) -> u64 {
        1000 / u64::from(self.display_fps.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.display_fps == 0 {
            return Err(StreamError::Configuration(
                "display_fps must be greater than zero".into(),
            ));
        }
        if self.max_video_fps == 0 {
            return Err(StreamError::Configuration(
                "max_video_fps must be greater than zero".into(),
            ));
        }

        let relaxation = &self.relaxation;
        if self.mode != PacingMode::Balanced
            && relaxation.overflow_threshold_for(self.mode) == 0
        {
            tracing::warn!(
                "Overflow threshold of 0 in {} mode relaxes on the first overflow",
                self.mode
            );
        }
        if relaxation.healthy_reset_frames == 0 {
            tracing::warn!("healthy_reset_frames of 0 clears the overflow streak on every enqueue");
        }
        if self.lenient_pacing_target < 1 {
            tracing::warn!("lenient_pacing_target below 1 drops every queued frame on vsync");
        }

        Ok(())
    }
}

/// Forced choice of enhancement pipeline. `Auto` lets the adapter decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancerOverride {
    #[default]
    Auto,
    /// Vendor driver upscaling (and SDR→HDR where offered).
    VendorDriver,
    VideoProcessorOnly,
    /// FSR1 shader upscaler.
    Fsr1,
    /// NIS shader upscaler.
    Nis,
    /// RCAS sharpener after video-processor scaling.
    Rcas,
    NisSharpener,
}

/// Renderer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub vsync: bool,
    /// Present with tearing allowed when vsync is off and the platform supports it.
    pub allow_tearing: bool,
    pub exclusive_fullscreen: bool,
    pub enhancer_override: EnhancerOverride,
    /// Video-processor edge enhancement strength. 0 disables it.
    pub edge_enhancement: u32,
    /// Whether the output display is currently in HDR mode.
    pub display_hdr: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            vsync: true,
            allow_tearing: true,
            exclusive_fullscreen: false,
            enhancer_override: EnhancerOverride::Auto,
            edge_enhancement: 0,
            display_hdr: false,
        }
    }
}

/// Complete presentation configuration, as stored in `present.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentConfig {
    pub pacer: PacerConfig,
    pub renderer: RendererSettings,
}

impl PresentConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "present.toml";

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| StreamError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.pacer.validate()?;
        Ok(config)
    }

    /// Load configuration from a file. Returns error if the file is missing,
    /// cannot be parsed or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_toml_str(&content).map_err(|e| match e {
            StreamError::Configuration(msg) => {
                StreamError::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        tracing::info!("Loaded present config from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a file, returning defaults if the file is
    /// missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| StreamError::Configuration(format!("Failed to serialize config: {}", e)))
    }
}
