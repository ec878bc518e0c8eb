// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Processing stages a frame can pass through before presentation.

use super::fence::Engine;

/// One slot of the two-step pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStep {
    /// Video processor converts YUV to RGB and scales in one pass.
    AllVideoProcessor,
    ConvertVideoProcessor,
    UpscaleVideoProcessor,
    /// YUV to RGB in a pixel shader.
    ConvertShader,
    /// FSR1 / NIS / bilinear upscale in a shader.
    UpscaleShader,
    /// RCAS / NIS sharpening in a shader.
    SharpenShader,
    /// AMD AMF converts and upscales in one pass.
    AllAmf,
    ConvertAmf,
    UpscaleAmf,
    /// NVIDIA RTX Video Super Resolution on the video processor.
    UpscaleVsr,
    None,
}

impl RenderStep {
    /// Engine the step's commands run on.
    pub fn engine(&self) -> Option<Engine> {
        match self {
            Self::AllVideoProcessor
            | Self::ConvertVideoProcessor
            | Self::UpscaleVideoProcessor
            | Self::UpscaleVsr => Some(Engine::VideoProcess),
            Self::ConvertShader | Self::UpscaleShader | Self::SharpenShader => Some(Engine::Graphics),
            Self::AllAmf | Self::ConvertAmf | Self::UpscaleAmf => Some(Engine::Accelerator),
            Self::None => None,
        }
    }

    pub fn is_convert(&self) -> bool {
        matches!(
            self,
            Self::ConvertVideoProcessor | Self::ConvertShader | Self::ConvertAmf
        )
    }

    pub fn is_upscale(&self) -> bool {
        matches!(
            self,
            Self::UpscaleVideoProcessor | Self::UpscaleShader | Self::UpscaleAmf | Self::UpscaleVsr
        )
    }

    /// Runs on a vendor accelerator rather than the standard video processor or shaders.
    pub fn uses_vendor_upscale(&self) -> bool {
        matches!(
            self,
            Self::AllAmf | Self::ConvertAmf | Self::UpscaleAmf | Self::UpscaleVsr
        )
    }

    pub fn is_none(&self) -> bool {
        *self == Self::None
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AllVideoProcessor => "all-video-processor",
            Self::ConvertVideoProcessor => "convert-video-processor",
            Self::UpscaleVideoProcessor => "upscale-video-processor",
            Self::ConvertShader => "convert-shader",
            Self::UpscaleShader => "upscale-shader",
            Self::SharpenShader => "sharpen-shader",
            Self::AllAmf => "all-amf",
            Self::ConvertAmf => "convert-amf",
            Self::UpscaleAmf => "upscale-amf",
            Self::UpscaleVsr => "upscale-vsr",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for RenderStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shader algorithm used by the shader upscale/sharpen steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShaderEnhancer {
    #[default]
    None,
    Fsr1,
    Nis,
    Rcas,
    NisSharpener,
    /// Plain bilinear scaling, for adapters without shader model 6.2.
    Bilinear,
}

impl ShaderEnhancer {
    pub fn is_upscaler(&self) -> bool {
        matches!(self, Self::Fsr1 | Self::Nis | Self::Bilinear)
    }

    pub fn is_sharpener(&self) -> bool {
        matches!(self, Self::Rcas | Self::NisSharpener)
    }

    /// FSR1 and NIS upscale with a built-in sharpening pass.
    pub fn sharpens(&self) -> bool {
        !matches!(self, Self::None | Self::Bilinear)
    }
}

/// Result of dispatching one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// The step's submission failed. The frame falls back to repeat/blank.
    Abort,
}

/// Texture a step reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureRole {
    /// Decoder surface (or its locked copy).
    Source,
    /// RGB at stream resolution.
    Rgb,
    /// YUV at output resolution.
    YuvUpscaled,
    /// RGB at output resolution, before the final step.
    RgbUpscaled,
    /// Final image copied into the back buffer.
    Output,
}

/// Input and output textures of both steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRouting {
    pub step1_input: TextureRole,
    pub step1_output: TextureRole,
    pub step2_input: TextureRole,
    pub step2_output: TextureRole,
}

impl StepRouting {
    pub fn for_steps(step2: RenderStep) -> Self {
        let step1_output = match step2 {
            RenderStep::None => TextureRole::Output,
            s if s.is_convert() => TextureRole::YuvUpscaled,
            s if s.is_upscale() => TextureRole::Rgb,
            RenderStep::SharpenShader => TextureRole::RgbUpscaled,
            // A combined step in slot 2 reads RGB like an upscaler.
            _ => TextureRole::Rgb,
        };
        Self {
            step1_input: TextureRole::Source,
            step1_output,
            step2_input: step1_output,
            step2_output: TextureRole::Output,
        }
    }

    /// Every intermediate texture the routing touches, without duplicates.
    pub fn intermediates(&self) -> Vec<TextureRole> {
        let mut roles = vec![self.step1_output];
        if self.step2_output != self.step1_output {
            roles.push(self.step2_output);
        }
        roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_by_second_step() {
        let r = StepRouting::for_steps(RenderStep::None);
        assert_eq!(r.step1_output, TextureRole::Output);
        assert_eq!(r.intermediates(), vec![TextureRole::Output]);

        let r = StepRouting::for_steps(RenderStep::ConvertShader);
        assert_eq!(r.step1_output, TextureRole::YuvUpscaled);
        assert_eq!(r.step2_input, TextureRole::YuvUpscaled);

        let r = StepRouting::for_steps(RenderStep::UpscaleVsr);
        assert_eq!(r.step1_output, TextureRole::Rgb);
        assert_eq!(r.step2_output, TextureRole::Output);

        let r = StepRouting::for_steps(RenderStep::SharpenShader);
        assert_eq!(r.step1_output, TextureRole::RgbUpscaled);
        assert_eq!(
            r.intermediates(),
            vec![TextureRole::RgbUpscaled, TextureRole::Output]
        );
    }

    #[test]
    fn test_engines() {
        assert_eq!(RenderStep::UpscaleVsr.engine(), Some(Engine::VideoProcess));
        assert_eq!(RenderStep::SharpenShader.engine(), Some(Engine::Graphics));
        assert_eq!(RenderStep::AllAmf.engine(), Some(Engine::Accelerator));
        assert_eq!(RenderStep::None.engine(), None);
    }

    #[test]
    fn test_enhancer_classes() {
        assert!(ShaderEnhancer::Fsr1.is_upscaler());
        assert!(ShaderEnhancer::Bilinear.is_upscaler());
        assert!(!ShaderEnhancer::Rcas.is_upscaler());
        assert!(ShaderEnhancer::NisSharpener.is_sharpener());
        assert!(!ShaderEnhancer::Bilinear.sharpens());
    }
}
