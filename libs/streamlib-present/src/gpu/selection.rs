// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Render-step auto-selection.
//!
//! [`resolve_render_plan`] is a pure function of the adapter capabilities,
//! stream shape, user override and probe results. Every input combination
//! resolves to a valid plan; the worst case is `AllVideoProcessor + None`
//! (or shader conversion when the video processor itself is unusable).
//!
//! Resolution order:
//! 1. Vendor default (or the user override).
//! 2. Vendor SDR->HDR and vendor upscaling reconciled with the stream, the
//!    display and the shader model.
//! 3. Vendor features checked against their probes.
//! 4. Video-processor probe fallbacks to shaders.

use super::capabilities::{GpuCapabilities, GpuVendor};
use super::render_step::{RenderStep, ShaderEnhancer};
use crate::core::config::EnhancerOverride;

/// Capability probe results gathered before selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResults {
    /// The vendor accelerator can upscale this stream.
    pub vendor_upscale: bool,
    /// The vendor accelerator can convert SDR to HDR.
    pub vendor_hdr: bool,
    /// The video processor supports YUV->RGB conversion for this format.
    pub vp_convert: bool,
    /// The video processor supports scaling to the output size.
    pub vp_upscale: bool,
}

impl Default for ProbeResults {
    fn default() -> Self {
        Self {
            vendor_upscale: true,
            vendor_hdr: true,
            vp_convert: true,
            vp_upscale: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SelectionInputs<'a> {
    pub caps: &'a GpuCapabilities,
    pub hdr_stream: bool,
    pub yuv444: bool,
    pub enhancer_override: EnhancerOverride,
    pub edge_enhancement: u32,
    pub display_hdr: bool,
    pub probes: ProbeResults,
}

/// Quality tier requested from the vendor upscaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VsrQuality {
    Low,
    Medium,
    High,
}

impl VsrQuality {
    pub fn for_caps(caps: &GpuCapabilities) -> Self {
        if caps.on_battery {
            Self::Low
        } else if caps.low_end {
            Self::Medium
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPlan {
    pub step1: RenderStep,
    pub step2: RenderStep,
    pub enhancer: ShaderEnhancer,
    pub vendor_upscale: bool,
    pub vendor_hdr: bool,
    pub vsr_quality: VsrQuality,
    pub upscaler_label: String,
    pub sharpener_label: String,
    pub algorithm_label: String,
}

impl std::fmt::Display for RenderPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} + {} [{}; upscaler: {}; sharpener: {}]",
            self.step1, self.step2, self.algorithm_label, self.upscaler_label, self.sharpener_label
        )
    }
}

struct Draft {
    step1: RenderStep,
    step2: RenderStep,
    enhancer: ShaderEnhancer,
    vendor_upscale: bool,
    vendor_hdr: bool,
    upscaler: &'static str,
    sharpener: &'static str,
    algorithm: &'static str,
}

impl Draft {
    fn new(step1: RenderStep, step2: RenderStep, enhancer: ShaderEnhancer) -> Self {
        Self {
            step1,
            step2,
            enhancer,
            vendor_upscale: false,
            vendor_hdr: false,
            upscaler: "Video Processor",
            sharpener: "None",
            algorithm: "Video Processor",
        }
    }

    fn labels(mut self, upscaler: &'static str, sharpener: &'static str, algorithm: &'static str) -> Self {
        self.upscaler = upscaler;
        self.sharpener = sharpener;
        self.algorithm = algorithm;
        self
    }

    fn vendor(mut self, upscale: bool, hdr: bool) -> Self {
        self.vendor_upscale = upscale;
        self.vendor_hdr = hdr;
        self
    }

    /// Plain video-processor plan, keeping the vendor flags.
    fn video_processor_only(&mut self, edge_enhancement: u32) {
        self.step1 = RenderStep::AllVideoProcessor;
        self.step2 = RenderStep::None;
        self.enhancer = ShaderEnhancer::None;
        self.upscaler = "Video Processor";
        self.sharpener = if edge_enhancement > 0 { "Video Processor" } else { "None" };
        self.algorithm = "Video Processor";
    }

    fn shader_upscaler(&mut self, shader_model_6_2: bool) {
        if shader_model_6_2 {
            self.enhancer = ShaderEnhancer::Fsr1;
            self.upscaler = "FSR1 EASU";
            self.sharpener = "FSR1 RCAS";
            self.algorithm = "Shader FSR1";
        } else {
            self.enhancer = ShaderEnhancer::Bilinear;
            self.upscaler = "Bilinear";
            self.sharpener = "None";
            self.algorithm = "Shader Bilinear";
        }
    }
}

fn vendor_default(caps: &GpuCapabilities, hdr_stream: bool) -> Draft {
    match caps.vendor {
        GpuVendor::Amd => Draft::new(RenderStep::AllAmf, RenderStep::None, ShaderEnhancer::None)
            .vendor(true, false)
            .labels("AMF FSR EASU", "AMF FSR RCAS", "AMF FSR1"),
        GpuVendor::Intel if caps.integrated => Draft::new(
            RenderStep::AllVideoProcessor,
            RenderStep::SharpenShader,
            ShaderEnhancer::Rcas,
        )
        .labels("Video Processor", "RCAS Sharpener", "Video Processor RCAS"),
        GpuVendor::Intel => {
            if hdr_stream {
                tracing::debug!("Intel discrete GPU with HDR stream, using shader FSR1");
            }
            Draft::new(
                RenderStep::ConvertShader,
                RenderStep::UpscaleShader,
                ShaderEnhancer::Fsr1,
            )
            .labels("FSR1 EASU", "FSR1 RCAS", "Shader FSR1")
        }
        GpuVendor::Nvidia if caps.vsr_eligible => {
            // TrueHDR stays off by default, it darkens some displays.
            Draft::new(RenderStep::ConvertShader, RenderStep::UpscaleVsr, ShaderEnhancer::None)
                .vendor(true, false)
                .labels(
                    "NVIDIA RTX Video Super Resolution",
                    "Video Processor",
                    "NVIDIA RTX Video Super Resolution",
                )
        }
        GpuVendor::Nvidia => Draft::new(
            RenderStep::ConvertShader,
            RenderStep::UpscaleShader,
            ShaderEnhancer::Nis,
        )
        .labels("Video Processor", "NIS Sharpener", "Video Processor NIS"),
        GpuVendor::Other(_) => {
            Draft::new(RenderStep::AllVideoProcessor, RenderStep::None, ShaderEnhancer::None)
        }
    }
}

fn apply_override(draft: Draft, inputs: &SelectionInputs<'_>) -> Draft {
    let keep_hdr = draft.vendor_hdr;
    match inputs.enhancer_override {
        EnhancerOverride::Auto => draft,
        EnhancerOverride::VendorDriver => {
            let (step1, step2, hdr) = match inputs.caps.vendor {
                GpuVendor::Amd => (RenderStep::AllAmf, RenderStep::None, false),
                GpuVendor::Intel => (RenderStep::AllVideoProcessor, RenderStep::ConvertShader, false),
                GpuVendor::Nvidia => (RenderStep::ConvertShader, RenderStep::UpscaleVsr, true),
                GpuVendor::Other(_) => (RenderStep::AllVideoProcessor, RenderStep::None, true),
            };
            Draft::new(step1, step2, ShaderEnhancer::None)
                .vendor(true, hdr)
                .labels("Vendor Driver Upscaler", "Vendor Driver Sharpener", "Vendor Driver")
        }
        EnhancerOverride::VideoProcessorOnly => {
            let mut d = Draft::new(RenderStep::AllVideoProcessor, RenderStep::None, ShaderEnhancer::None)
                .vendor(false, keep_hdr);
            d.video_processor_only(inputs.edge_enhancement);
            d
        }
        EnhancerOverride::Fsr1 => {
            Draft::new(RenderStep::ConvertShader, RenderStep::UpscaleShader, ShaderEnhancer::Fsr1)
                .vendor(false, keep_hdr)
                .labels("FSR1 EASU", "FSR1 RCAS", "Shader FSR1")
        }
        EnhancerOverride::Nis => {
            Draft::new(RenderStep::ConvertShader, RenderStep::UpscaleShader, ShaderEnhancer::Nis)
                .vendor(false, keep_hdr)
                .labels("NIS Upscaler", "NIS Sharpener", "Shader NIS")
        }
        EnhancerOverride::Rcas => Draft::new(
            RenderStep::AllVideoProcessor,
            RenderStep::SharpenShader,
            ShaderEnhancer::Rcas,
        )
        .vendor(false, keep_hdr)
        .labels("Video Processor", "RCAS Sharpener", "Video Processor RCAS"),
        EnhancerOverride::NisSharpener => Draft::new(
            RenderStep::AllVideoProcessor,
            RenderStep::SharpenShader,
            ShaderEnhancer::NisSharpener,
        )
        .vendor(false, keep_hdr)
        .labels("Video Processor", "NIS Sharpener", "Video Processor NIS"),
    }
}

/// Choose the two render steps for a session.
pub fn resolve_render_plan(inputs: &SelectionInputs<'_>) -> RenderPlan {
    let caps = inputs.caps;
    let probes = inputs.probes;
    let mut d = apply_override(vendor_default(caps, inputs.hdr_stream), inputs);

    // SDR->HDR only makes sense for an SDR stream on an HDR display.
    if inputs.hdr_stream || !inputs.display_hdr {
        d.vendor_hdr = false;
    }

    if d.enhancer.is_upscaler() {
        d.vendor_upscale = false;
    }

    if !caps.shader_model_6_2 {
        tracing::info!("Shader model 6.2 unavailable, using the video processor");
        d.vendor_upscale = false;
        d.vendor_hdr = false;
        d.video_processor_only(inputs.edge_enhancement);
    }

    // Vendor upscaling is wanted exactly when a step runs on the accelerator.
    d.vendor_upscale = d.step1.uses_vendor_upscale() || d.step2.uses_vendor_upscale();
    if d.vendor_upscale && !probes.vendor_upscale {
        tracing::info!("{} upscaling unavailable, falling back to the video processor", caps.vendor);
        d.vendor_upscale = false;
        d.video_processor_only(inputs.edge_enhancement);
    }

    if d.vendor_hdr {
        d.vendor_hdr = probes.vendor_hdr;
    }

    if d.step1 == RenderStep::AllVideoProcessor && inputs.edge_enhancement > 0 {
        d.step2 = RenderStep::None;
        d.sharpener = "Video Processor";
        d.algorithm = "Video Processor";
    }

    // The shader YUV->RGB path only handles 4:2:0.
    if inputs.yuv444 {
        if d.step1 == RenderStep::ConvertShader {
            d.step1 = RenderStep::ConvertVideoProcessor;
        }
        if d.step2 == RenderStep::ConvertShader {
            d.step2 = RenderStep::ConvertVideoProcessor;
        }
    }

    if !probes.vp_convert {
        match d.step1 {
            RenderStep::ConvertVideoProcessor => d.step1 = RenderStep::ConvertShader,
            RenderStep::AllVideoProcessor => {
                d.step1 = RenderStep::ConvertShader;
                d.step2 = RenderStep::UpscaleShader;
                d.shader_upscaler(caps.shader_model_6_2);
            }
            _ => {}
        }
        if d.step2 == RenderStep::ConvertVideoProcessor {
            d.step2 = RenderStep::ConvertShader;
        }
    }

    if !probes.vp_upscale {
        if d.step1 == RenderStep::AllVideoProcessor {
            d.step1 = if inputs.yuv444 && probes.vp_convert {
                RenderStep::ConvertVideoProcessor
            } else {
                RenderStep::ConvertShader
            };
            d.step2 = RenderStep::UpscaleShader;
            d.shader_upscaler(caps.shader_model_6_2);
        }
        if d.step2 == RenderStep::UpscaleVideoProcessor {
            d.step2 = RenderStep::UpscaleShader;
            d.shader_upscaler(caps.shader_model_6_2);
        }
    }

    let mut algorithm_label = d.algorithm.to_string();
    if d.vendor_hdr {
        algorithm_label.push_str(" (SDR->HDR)");
    }

    RenderPlan {
        step1: d.step1,
        step2: d.step2,
        enhancer: d.enhancer,
        vendor_upscale: d.vendor_upscale,
        vendor_hdr: d.vendor_hdr,
        vsr_quality: VsrQuality::for_caps(caps),
        upscaler_label: d.upscaler.to_string(),
        sharpener_label: d.sharpener.to_string(),
        algorithm_label,
    }
}
