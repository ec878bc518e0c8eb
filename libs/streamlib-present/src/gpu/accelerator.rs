// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Vendor accelerator backends.
//!
//! Each vendor's upscaler / SDR->HDR path is an [`AcceleratorBackend`]:
//! probed once before selection, activated once after it, and asked for
//! commands on every frame that runs an accelerator step.

use super::capabilities::{GpuCapabilities, GpuVendor};
use super::device::{GpuCommand, GpuDevice, VendorFeature};
use super::fence::Engine;
use super::render_step::RenderStep;
use super::selection::VsrQuality;
use super::texture::TextureId;
use crate::core::{Result, StreamError};

/// What an accelerator can do on this adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcceleratorProbe {
    pub upscale: bool,
    pub sdr_to_hdr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluateParams {
    pub step: RenderStep,
    pub input: TextureId,
    pub output: TextureId,
    /// Intermediate for two-pass evaluation (upscale then SDR->HDR).
    pub scratch: Option<TextureId>,
    pub quality: VsrQuality,
    pub sdr_to_hdr: bool,
}

pub trait AcceleratorBackend: Send {
    fn name(&self) -> &'static str;

    fn engine(&self) -> Engine;

    fn probe(&self, caps: &GpuCapabilities, device: &dyn GpuDevice) -> AcceleratorProbe;

    /// Enable or disable the driver features for this session.
    fn activate(&mut self, device: &mut dyn GpuDevice, upscale: bool, sdr_to_hdr: bool) -> Result<()>;

    fn evaluate(&self, params: &EvaluateParams) -> Vec<GpuCommand>;
}

fn set_features(
    device: &mut dyn GpuDevice,
    scaler: VendorFeature,
    hdr: VendorFeature,
    upscale: bool,
    sdr_to_hdr: bool,
) -> Result<()> {
    device.set_vendor_feature(scaler, upscale)?;
    device.set_vendor_feature(hdr, sdr_to_hdr)?;
    Ok(())
}

/// AMD AMF: runs on its own compute queue and can convert, upscale or both.
#[derive(Debug, Default)]
pub struct AmdAmfAccelerator {
    active: bool,
}

impl AcceleratorBackend for AmdAmfAccelerator {
    fn name(&self) -> &'static str {
        "amd-amf"
    }

    fn engine(&self) -> Engine {
        Engine::Accelerator
    }

    fn probe(&self, _caps: &GpuCapabilities, device: &dyn GpuDevice) -> AcceleratorProbe {
        AcceleratorProbe {
            upscale: device.supports_vendor_feature(VendorFeature::AmfScaler),
            sdr_to_hdr: device.supports_vendor_feature(VendorFeature::AmfSdrToHdr),
        }
    }

    fn activate(&mut self, device: &mut dyn GpuDevice, upscale: bool, sdr_to_hdr: bool) -> Result<()> {
        set_features(
            device,
            VendorFeature::AmfScaler,
            VendorFeature::AmfSdrToHdr,
            upscale,
            sdr_to_hdr,
        )?;
        self.active = upscale || sdr_to_hdr;
        Ok(())
    }

    fn evaluate(&self, params: &EvaluateParams) -> Vec<GpuCommand> {
        vec![GpuCommand::VendorEvaluate {
            backend: self.name(),
            input: params.input,
            output: params.output,
            convert: matches!(params.step, RenderStep::AllAmf | RenderStep::ConvertAmf),
            scale: matches!(params.step, RenderStep::AllAmf | RenderStep::UpscaleAmf),
            quality: params.quality,
            sdr_to_hdr: params.sdr_to_hdr,
        }]
    }
}

/// Intel video-processor super resolution extension.
#[derive(Debug, Default)]
pub struct IntelVpeAccelerator;

impl AcceleratorBackend for IntelVpeAccelerator {
    fn name(&self) -> &'static str {
        "intel-vpe"
    }

    fn engine(&self) -> Engine {
        Engine::VideoProcess
    }

    fn probe(&self, _caps: &GpuCapabilities, device: &dyn GpuDevice) -> AcceleratorProbe {
        AcceleratorProbe {
            upscale: device.supports_vendor_feature(VendorFeature::IntelVpeScaler),
            sdr_to_hdr: device.supports_vendor_feature(VendorFeature::IntelVpeSdrToHdr),
        }
    }

    fn activate(&mut self, device: &mut dyn GpuDevice, upscale: bool, sdr_to_hdr: bool) -> Result<()> {
        set_features(
            device,
            VendorFeature::IntelVpeScaler,
            VendorFeature::IntelVpeSdrToHdr,
            upscale,
            sdr_to_hdr,
        )
    }

    fn evaluate(&self, params: &EvaluateParams) -> Vec<GpuCommand> {
        vec![GpuCommand::VendorEvaluate {
            backend: self.name(),
            input: params.input,
            output: params.output,
            convert: false,
            scale: true,
            quality: params.quality,
            sdr_to_hdr: params.sdr_to_hdr,
        }]
    }
}

/// NVIDIA RTX Video Super Resolution and TrueHDR.
#[derive(Debug, Default)]
pub struct NvidiaRtxAccelerator;

impl AcceleratorBackend for NvidiaRtxAccelerator {
    fn name(&self) -> &'static str {
        "nvidia-rtx"
    }

    fn engine(&self) -> Engine {
        Engine::VideoProcess
    }

    fn probe(&self, caps: &GpuCapabilities, device: &dyn GpuDevice) -> AcceleratorProbe {
        AcceleratorProbe {
            upscale: caps.vsr_eligible && device.supports_vendor_feature(VendorFeature::NvidiaVsr),
            sdr_to_hdr: device.supports_vendor_feature(VendorFeature::NvidiaTrueHdr),
        }
    }

    fn activate(&mut self, device: &mut dyn GpuDevice, upscale: bool, sdr_to_hdr: bool) -> Result<()> {
        set_features(
            device,
            VendorFeature::NvidiaVsr,
            VendorFeature::NvidiaTrueHdr,
            upscale,
            sdr_to_hdr,
        )
    }

    fn evaluate(&self, params: &EvaluateParams) -> Vec<GpuCommand> {
        // TrueHDR runs as a second pass over the upscaled image.
        match (params.sdr_to_hdr, params.scratch) {
            (true, Some(scratch)) => vec![
                GpuCommand::VendorEvaluate {
                    backend: self.name(),
                    input: params.input,
                    output: scratch,
                    convert: false,
                    scale: true,
                    quality: params.quality,
                    sdr_to_hdr: false,
                },
                GpuCommand::VendorEvaluate {
                    backend: self.name(),
                    input: scratch,
                    output: params.output,
                    convert: false,
                    scale: false,
                    quality: params.quality,
                    sdr_to_hdr: true,
                },
            ],
            _ => vec![GpuCommand::VendorEvaluate {
                backend: self.name(),
                input: params.input,
                output: params.output,
                convert: false,
                scale: true,
                quality: params.quality,
                sdr_to_hdr: false,
            }],
        }
    }
}

/// Adapters without a vendor path.
#[derive(Debug, Default)]
pub struct NoAccelerator;

impl AcceleratorBackend for NoAccelerator {
    fn name(&self) -> &'static str {
        "none"
    }

    fn engine(&self) -> Engine {
        Engine::VideoProcess
    }

    fn probe(&self, _caps: &GpuCapabilities, _device: &dyn GpuDevice) -> AcceleratorProbe {
        AcceleratorProbe::default()
    }

    fn activate(&mut self, _device: &mut dyn GpuDevice, upscale: bool, sdr_to_hdr: bool) -> Result<()> {
        if upscale || sdr_to_hdr {
            return Err(StreamError::NotSupported(
                "no vendor accelerator on this adapter".into(),
            ));
        }
        Ok(())
    }

    fn evaluate(&self, _params: &EvaluateParams) -> Vec<GpuCommand> {
        Vec::new()
    }
}

pub fn accelerator_for(vendor: GpuVendor) -> Box<dyn AcceleratorBackend> {
    match vendor {
        GpuVendor::Amd => Box::new(AmdAmfAccelerator::default()),
        GpuVendor::Intel => Box::new(IntelVpeAccelerator),
        GpuVendor::Nvidia => Box::new(NvidiaRtxAccelerator),
        GpuVendor::Other(_) => Box::new(NoAccelerator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(step: RenderStep, sdr_to_hdr: bool, scratch: Option<TextureId>) -> EvaluateParams {
        EvaluateParams {
            step,
            input: TextureId(1),
            output: TextureId(2),
            scratch,
            quality: VsrQuality::High,
            sdr_to_hdr,
        }
    }

    #[test]
    fn test_factory_by_vendor() {
        assert_eq!(accelerator_for(GpuVendor::Amd).name(), "amd-amf");
        assert_eq!(accelerator_for(GpuVendor::Amd).engine(), Engine::Accelerator);
        assert_eq!(accelerator_for(GpuVendor::Nvidia).engine(), Engine::VideoProcess);
        assert_eq!(accelerator_for(GpuVendor::Other(3)).name(), "none");
    }

    #[test]
    fn test_amf_step_flags() {
        let cmds = AmdAmfAccelerator::default().evaluate(&params(RenderStep::UpscaleAmf, false, None));
        assert!(matches!(
            cmds.as_slice(),
            [GpuCommand::VendorEvaluate { convert: false, scale: true, .. }]
        ));
    }

    #[test]
    fn test_nvidia_true_hdr_is_second_pass() {
        let cmds = NvidiaRtxAccelerator.evaluate(&params(RenderStep::UpscaleVsr, true, Some(TextureId(9))));
        assert_eq!(cmds.len(), 2);
        assert!(matches!(
            cmds[1],
            GpuCommand::VendorEvaluate { input: TextureId(9), output: TextureId(2), sdr_to_hdr: true, .. }
        ));

        let cmds = NvidiaRtxAccelerator.evaluate(&params(RenderStep::UpscaleVsr, false, None));
        assert_eq!(cmds.len(), 1);
    }
}
