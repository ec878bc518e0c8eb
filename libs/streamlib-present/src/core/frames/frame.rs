// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Decoded frame handed from the decoder to the presentation pipeline.

use std::time::Instant;

use super::PooledFrameSlot;

/// GPU surface shared between the decoder and the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// Decoder output pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit 4:2:0.
    Nv12,
    /// 10-bit 4:2:0.
    P010,
    /// 8-bit 4:4:4.
    Ayuv,
    /// 10-bit 4:4:4.
    Y410,
}

impl PixelFormat {
    /// Decoder format for a stream.
    pub fn for_stream(hdr: bool, yuv444: bool) -> Self {
        match (hdr, yuv444) {
            (true, true) => Self::Y410,
            (true, false) => Self::P010,
            (false, true) => Self::Ayuv,
            (false, false) => Self::Nv12,
        }
    }

    pub fn bit_depth(&self) -> u32 {
        match self {
            Self::Nv12 | Self::Ayuv => 8,
            Self::P010 | Self::Y410 => 10,
        }
    }

    pub fn is_yuv444(&self) -> bool {
        matches!(self, Self::Ayuv | Self::Y410)
    }

    /// Chroma subsampled horizontally / vertically.
    pub fn chroma_subsampling(&self) -> (bool, bool) {
        if self.is_yuv444() {
            (false, false)
        } else {
            (true, true)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorRange {
    #[default]
    Limited,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    Bt601,
    #[default]
    Bt709,
    Bt2020,
}

/// Chroma sample position relative to luma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChromaLocation {
    #[default]
    Left,
    Center,
    TopLeft,
    Top,
    BottomLeft,
    Bottom,
}

/// Format/colorimetry of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub range: ColorRange,
    pub color_space: ColorSpace,
    pub chroma_location: ChromaLocation,
}

impl FrameDescriptor {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            range: ColorRange::default(),
            color_space: if format.bit_depth() > 8 {
                ColorSpace::Bt2020
            } else {
                ColorSpace::default()
            },
            chroma_location: ChromaLocation::default(),
        }
    }

    pub fn with_range(mut self, range: ColorRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn with_chroma_location(mut self, chroma_location: ChromaLocation) -> Self {
        self.chroma_location = chroma_location;
        self
    }

    /// Whether `other` needs different conversion constants or resources.
    pub fn format_changed(&self, other: &FrameDescriptor) -> bool {
        self != other
    }
}

/// Where the frame's pixels live and how the renderer must synchronize with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBacking {
    /// Not GPU-resident. The renderer cannot sample it.
    Cpu,
    /// Decoder and renderer share a GPU timeline; the surface is ready once
    /// the decoder timeline reaches `fence_value`.
    SharedFence { surface: SurfaceId, fence_value: u64 },
    /// Decoder context is not fence-synchronized with the renderer; the
    /// surface must be copied under the decoder context lock.
    LockedCopy { surface: SurfaceId },
}

/// A decoded frame.
///
/// Exclusively owned by one queue or thread at a time. Dropping it returns its
/// decoder buffer (if any) to the pool.
#[derive(Debug)]
pub struct Frame {
    sequence: u64,
    capture_time: Instant,
    descriptor: FrameDescriptor,
    backing: FrameBacking,
    slot: Option<PooledFrameSlot>,
}

impl Frame {
    pub fn new(sequence: u64, descriptor: FrameDescriptor, backing: FrameBacking) -> Self {
        Self {
            sequence,
            capture_time: Instant::now(),
            descriptor,
            backing,
            slot: None,
        }
    }

    /// Presentation timestamp (time the source captured the frame).
    pub fn with_capture_time(mut self, capture_time: Instant) -> Self {
        self.capture_time = capture_time;
        self
    }

    /// Tie the frame's lifetime to a decoder pool slot.
    pub fn with_slot(mut self, slot: PooledFrameSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn capture_time(&self) -> Instant {
        self.capture_time
    }

    pub fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    pub fn backing(&self) -> FrameBacking {
        self.backing
    }

    /// Decoder pool slot this frame keeps alive, if any.
    pub fn slot_index(&self) -> Option<u32> {
        self.slot.as_ref().map(PooledFrameSlot::index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_format_for_stream() {
        assert_eq!(PixelFormat::for_stream(false, false), PixelFormat::Nv12);
        assert_eq!(PixelFormat::for_stream(true, false), PixelFormat::P010);
        assert_eq!(PixelFormat::for_stream(false, true), PixelFormat::Ayuv);
        assert_eq!(PixelFormat::for_stream(true, true), PixelFormat::Y410);
    }

    #[test]
    fn test_format_changed() {
        let base = FrameDescriptor::new(1920, 1080, PixelFormat::Nv12);
        assert!(!base.format_changed(&base));
        assert!(base.format_changed(&FrameDescriptor::new(1280, 720, PixelFormat::Nv12)));
        assert!(base.format_changed(&base.with_range(ColorRange::Full)));
        assert!(base.format_changed(&base.with_chroma_location(ChromaLocation::TopLeft)));
        assert!(base.format_changed(&base.with_color_space(ColorSpace::Bt601)));
    }

    #[test]
    fn test_ten_bit_defaults_to_bt2020() {
        let desc = FrameDescriptor::new(3840, 2160, PixelFormat::P010);
        assert_eq!(desc.color_space, ColorSpace::Bt2020);
    }

    #[test]
    fn test_dropping_frame_returns_its_slot() {
        let pool = crate::core::frames::FramePool::new(2);
        let frame = Frame::new(
            0,
            FrameDescriptor::new(1920, 1080, PixelFormat::Nv12),
            FrameBacking::Cpu,
        );
        assert_eq!(frame.slot_index(), None);

        let slot = pool.acquire().unwrap();
        let index = slot.index();
        let frame = frame.with_slot(slot);
        assert_eq!(frame.slot_index(), Some(index));
        assert_eq!(pool.stats().in_use, 1);

        drop(frame);
        assert_eq!(pool.stats().in_use, 0);
    }
}
