// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Texture descriptions and the sizing rules for a session's texture set.

use bitflags::bitflags;

use super::render_step::TextureRole;
use crate::core::frames::PixelFormat;
use crate::core::renderer::StreamParameters;

/// Device texture handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Texture pixel formats used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit 4:2:0 YUV.
    Nv12,
    /// 10-bit 4:2:0 YUV.
    P010,
    /// 8-bit 4:4:4 YUV.
    Ayuv,
    /// 10-bit 4:4:4 YUV.
    Y410,
    Rgba8Unorm,
    Bgra8Unorm,
    Rgb10A2Unorm,
    Rgba16Float,
}

impl TextureFormat {
    /// Decoder surface format for a stream.
    pub fn for_decoder(hdr: bool, yuv444: bool) -> Self {
        Self::from(PixelFormat::for_stream(hdr, yuv444))
    }

    /// Format of RGB intermediates and the output texture.
    pub fn rgb(hdr: bool) -> Self {
        if hdr { Self::Rgb10A2Unorm } else { Self::Rgba8Unorm }
    }

    pub fn is_yuv(&self) -> bool {
        matches!(self, Self::Nv12 | Self::P010 | Self::Ayuv | Self::Y410)
    }
}

impl From<PixelFormat> for TextureFormat {
    fn from(format: PixelFormat) -> Self {
        match format {
            PixelFormat::Nv12 => Self::Nv12,
            PixelFormat::P010 => Self::P010,
            PixelFormat::Ayuv => Self::Ayuv,
            PixelFormat::Y410 => Self::Y410,
        }
    }
}

bitflags! {
    /// How a texture may be bound.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsages: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const SHADER_READ = 1 << 2;
        const RENDER_TARGET = 1 << 3;
        /// Unordered access, for compute upscalers.
        const STORAGE = 1 << 4;
        /// Video processor input or output.
        const VIDEO_PROCESS = 1 << 5;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsages,
}

impl TextureDescriptor {
    pub fn new(label: &'static str, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label,
            width,
            height,
            format,
            usage: TextureUsages::SHADER_READ | TextureUsages::COPY_SRC,
        }
    }

    pub fn with_usage(mut self, usage: TextureUsages) -> Self {
        self.usage = usage;
        self
    }
}

/// Placement of the output image inside the back buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

fn round_up_even(v: u32) -> u32 {
    v.saturating_add(1) & !1
}

fn align_up(v: u32, alignment: u32) -> u32 {
    v.div_ceil(alignment) * alignment
}

/// Sizes derived from the stream and window at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureGeometry {
    /// Stream size rounded to even.
    pub texture_width: u32,
    pub texture_height: u32,
    /// Decoder surface allocation, aligned for the codec.
    pub frame_width: u32,
    pub frame_height: u32,
    /// Window size rounded to even.
    pub display_width: u32,
    pub display_height: u32,
    pub output: OutputRect,
    pub decoder_format: TextureFormat,
    pub rgb_format: TextureFormat,
}

impl TextureGeometry {
    pub fn new(params: &StreamParameters) -> Self {
        let texture_width = round_up_even(params.width.max(2));
        let texture_height = round_up_even(params.height.max(2));
        let alignment = params.codec.surface_alignment();
        let display_width = round_up_even(params.window_width.max(2));
        let display_height = round_up_even(params.window_height.max(2));

        Self {
            texture_width,
            texture_height,
            frame_width: align_up(texture_width, alignment),
            frame_height: align_up(texture_height, alignment),
            display_width,
            display_height,
            output: letterbox(texture_width, texture_height, display_width, display_height),
            decoder_format: TextureFormat::for_decoder(params.hdr, params.yuv444),
            rgb_format: TextureFormat::rgb(params.hdr),
        }
    }

    /// Whether the output is the same size as the stream.
    pub fn is_native_size(&self) -> bool {
        self.output.width == self.texture_width && self.output.height == self.texture_height
    }

    /// Descriptor for a pipeline texture.
    pub fn descriptor(&self, role: TextureRole) -> TextureDescriptor {
        let (w, h) = (self.output.width, self.output.height);
        match role {
            TextureRole::Source => TextureDescriptor::new(
                "decoder-copy",
                self.texture_width,
                self.texture_height,
                self.decoder_format,
            )
            .with_usage(TextureUsages::COPY_DST | TextureUsages::SHADER_READ | TextureUsages::VIDEO_PROCESS),
            TextureRole::Rgb => TextureDescriptor::new(
                "rgb",
                self.texture_width,
                self.texture_height,
                self.rgb_format,
            )
            .with_usage(Self::intermediate_usage()),
            TextureRole::YuvUpscaled => {
                TextureDescriptor::new("yuv-upscaled", w, h, self.decoder_format)
                    .with_usage(Self::intermediate_usage())
            }
            TextureRole::RgbUpscaled => {
                TextureDescriptor::new("rgb-upscaled", w, h, self.rgb_format)
                    .with_usage(Self::intermediate_usage())
            }
            TextureRole::Output => TextureDescriptor::new("output", w, h, self.rgb_format)
                .with_usage(Self::intermediate_usage() | TextureUsages::COPY_SRC),
        }
    }

    fn intermediate_usage() -> TextureUsages {
        TextureUsages::SHADER_READ
            | TextureUsages::RENDER_TARGET
            | TextureUsages::STORAGE
            | TextureUsages::VIDEO_PROCESS
    }
}

/// Fit `src` into `dst` preserving aspect ratio, centred, with even size and offset.
pub fn letterbox(src_width: u32, src_height: u32, dst_width: u32, dst_height: u32) -> OutputRect {
    let mut rect = OutputRect {
        left: 0,
        top: 0,
        width: dst_width,
        height: dst_height,
    };
    if src_width == 0 || src_height == 0 {
        return rect;
    }

    let (sw, sh) = (u64::from(src_width), u64::from(src_height));
    let (dw, dh) = (u64::from(dst_width), u64::from(dst_height));

    // Compare dst_h/src_h against dst_w/src_w without floats.
    if dh * sw < dw * sh {
        rect.width = ((sw * dh / sh) as u32) & !1;
        rect.left = (dst_width.abs_diff(rect.width) / 2) & !1;
    } else if dw * sh < dh * sw {
        rect.height = ((sh * dw / sw) as u32) & !1;
        rect.top = (dst_height.abs_diff(rect.height) / 2) & !1;
    }
    rect
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::renderer::VideoCodec;

    #[test]
    fn test_rounding_and_alignment() {
        let params = StreamParameters::new(VideoCodec::H264, 1279, 719, 60).with_window(1921, 1080);
        let g = TextureGeometry::new(&params);
        assert_eq!((g.texture_width, g.texture_height), (1280, 720));
        assert_eq!((g.frame_width, g.frame_height), (1280, 720));
        assert_eq!((g.display_width, g.display_height), (1922, 1080));

        let params = StreamParameters::new(VideoCodec::Hevc, 1920, 1080, 60).with_window(1920, 1080);
        let g = TextureGeometry::new(&params);
        assert_eq!((g.frame_width, g.frame_height), (1920, 1152));
        assert!(g.is_native_size());
    }

    #[test]
    fn test_decoder_formats() {
        assert_eq!(TextureFormat::for_decoder(false, false), TextureFormat::Nv12);
        assert_eq!(TextureFormat::for_decoder(true, false), TextureFormat::P010);
        assert_eq!(TextureFormat::for_decoder(false, true), TextureFormat::Ayuv);
        assert_eq!(TextureFormat::for_decoder(true, true), TextureFormat::Y410);
    }

    #[test]
    fn test_letterbox_pillarbox() {
        // 16:9 into 4:3: bars top and bottom.
        let r = letterbox(1920, 1080, 1600, 1200);
        assert_eq!(r, OutputRect { left: 0, top: 150, width: 1600, height: 900 });

        // 4:3 into 16:9: bars left and right.
        let r = letterbox(1440, 1080, 1920, 1080);
        assert_eq!(r, OutputRect { left: 240, top: 0, width: 1440, height: 1080 });

        // Same aspect: full surface.
        let r = letterbox(1280, 720, 2560, 1440);
        assert_eq!(r, OutputRect { left: 0, top: 0, width: 2560, height: 1440 });
    }

    #[test]
    fn test_letterbox_keeps_even() {
        let r = letterbox(1920, 1080, 1000, 1000);
        assert_eq!(r.width % 2, 0);
        assert_eq!(r.height % 2, 0);
        assert_eq!(r.top % 2, 0);
        assert_eq!(r.left % 2, 0);
        assert!(r.top + r.height <= 1000);
    }

    #[test]
    fn test_descriptor_sizes_by_role() {
        let params = StreamParameters::new(VideoCodec::Av1, 1280, 720, 60).with_window(2560, 1440);
        let g = TextureGeometry::new(&params);
        let rgb = g.descriptor(TextureRole::Rgb);
        assert_eq!((rgb.width, rgb.height), (1280, 720));
        let out = g.descriptor(TextureRole::Output);
        assert_eq!((out.width, out.height), (2560, 1440));
        assert_eq!(out.format, TextureFormat::Rgba8Unorm);
        let yuv = g.descriptor(TextureRole::YuvUpscaled);
        assert_eq!(yuv.format, TextureFormat::Nv12);
    }
}
