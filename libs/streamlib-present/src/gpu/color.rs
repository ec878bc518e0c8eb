// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! YUV->RGB conversion constants for the shader conversion pass.

use crate::core::frames::{ChromaLocation, ColorRange, ColorSpace, FrameDescriptor};

/// Full-range matrices, column-major (Y, U, V columns).
const BT601: [f32; 9] = [1.0, 1.0, 1.0, 0.0, -0.3441, 1.7720, 1.4020, -0.7141, 0.0];
const BT709: [f32; 9] = [1.0, 1.0, 1.0, 0.0, -0.1873, 1.8556, 1.5748, -0.4681, 0.0];
const BT2020: [f32; 9] = [1.0, 1.0, 1.0, 0.0, -0.1646, 1.8814, 1.4746, -0.5714, 0.0];

/// Constants uploaded with every shader conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CscConstants {
    /// Matrix premultiplied by the range scale.
    pub matrix: [f32; 9],
    /// Normalized Y/U/V offsets subtracted before the multiply.
    pub offsets: [f32; 3],
    /// Chroma sample position in luma texels.
    pub chroma_offset: [f32; 2],
}

impl CscConstants {
    pub fn for_frame(desc: &FrameDescriptor) -> Self {
        let (matrix, offsets) = premultiplied_matrix(
            desc.color_space,
            desc.range,
            desc.format.bit_depth(),
        );
        let (sub_h, sub_v) = desc.format.chroma_subsampling();
        Self {
            matrix,
            offsets,
            chroma_offset: chroma_offset(desc.chroma_location, sub_h, sub_v),
        }
    }
}

fn base_matrix(space: ColorSpace) -> [f32; 9] {
    match space {
        ColorSpace::Bt601 => BT601,
        ColorSpace::Bt709 => BT709,
        ColorSpace::Bt2020 => BT2020,
    }
}

/// Scale the full-range matrix for `range` at `bits` per channel.
pub fn premultiplied_matrix(space: ColorSpace, range: ColorRange, bits: u32) -> ([f32; 9], [f32; 3]) {
    let bits = bits.clamp(8, 16);
    let shift = bits - 8;
    let channel_range = f64::from(1u32 << bits);
    let max = channel_range - 1.0;
    let full = range == ColorRange::Full;

    let y_min = if full { 0.0 } else { f64::from(16u32 << shift) };
    let y_max = if full { max } else { f64::from(235u32 << shift) };
    let uv_min = y_min;
    let uv_max = if full { max } else { f64::from(240u32 << shift) };
    let y_scale = max / (y_max - y_min);
    let uv_scale = max / (uv_max - uv_min);

    let chroma_mid = (channel_range / 2.0) / max;
    let offsets = [(y_min / max) as f32, chroma_mid as f32, chroma_mid as f32];

    let mut matrix = base_matrix(space);
    for (i, m) in matrix.iter_mut().enumerate() {
        let scale = if i < 3 { y_scale } else { uv_scale };
        *m = (f64::from(*m) * scale) as f32;
    }
    (matrix, offsets)
}

/// Chroma cositing offset, zeroed on axes that are not subsampled.
pub fn chroma_offset(location: ChromaLocation, subsampled_h: bool, subsampled_v: bool) -> [f32; 2] {
    let (x, y) = match location {
        ChromaLocation::Left => (0.5, 0.0),
        ChromaLocation::Center => (0.0, 0.0),
        ChromaLocation::TopLeft => (0.5, 0.5),
        ChromaLocation::Top => (0.0, 0.5),
        ChromaLocation::BottomLeft => (0.5, -0.5),
        ChromaLocation::Bottom => (0.0, -0.5),
    };
    [
        if subsampled_h { x } else { 0.0 },
        if subsampled_v { y } else { 0.0 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::PixelFormat;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_full_range_is_unscaled() {
        let (m, o) = premultiplied_matrix(ColorSpace::Bt709, ColorRange::Full, 8);
        assert_eq!(m, BT709);
        assert!(close(o[0], 0.0));
        assert!(close(o[1], 128.0 / 255.0));
    }

    #[test]
    fn test_limited_range_8bit() {
        let (m, o) = premultiplied_matrix(ColorSpace::Bt601, ColorRange::Limited, 8);
        let y_scale = 255.0 / 219.0;
        let uv_scale = 255.0 / 224.0;
        assert!(close(m[0], y_scale));
        assert!(close(m[4], -0.3441 * uv_scale));
        assert!(close(o[0], 16.0 / 255.0));
    }

    #[test]
    fn test_limited_range_10bit() {
        let (m, o) = premultiplied_matrix(ColorSpace::Bt2020, ColorRange::Limited, 10);
        assert!(close(m[0], 1023.0 / (940.0 - 64.0)));
        assert!(close(o[0], 64.0 / 1023.0));
        assert!(close(o[2], 512.0 / 1023.0));
    }

    #[test]
    fn test_chroma_offsets() {
        assert_eq!(chroma_offset(ChromaLocation::TopLeft, true, true), [0.5, 0.5]);
        assert_eq!(chroma_offset(ChromaLocation::Bottom, true, true), [0.0, -0.5]);
        assert_eq!(chroma_offset(ChromaLocation::TopLeft, false, false), [0.0, 0.0]);
    }

    #[test]
    fn test_for_frame_444_has_no_cositing() {
        let desc = FrameDescriptor::new(1920, 1080, PixelFormat::Ayuv)
            .with_chroma_location(ChromaLocation::TopLeft);
        let csc = CscConstants::for_frame(&desc);
        assert_eq!(csc.chroma_offset, [0.0, 0.0]);

        let desc = FrameDescriptor::new(1920, 1080, PixelFormat::Nv12);
        assert_eq!(CscConstants::for_frame(&desc).chroma_offset, [0.5, 0.0]);
    }
}
