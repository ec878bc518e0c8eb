// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    #[default]
    H264,
    Hevc,
    Av1,
}

impl VideoCodec {
    /// Decoder surface alignment in pixels.
    pub fn surface_alignment(&self) -> u32 {
        match self {
            Self::H264 => 16,
            Self::Hevc | Self::Av1 => 128,
        }
    }
}

/// Stream and window parameters a renderer is initialized with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamParameters {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub max_fps: u32,
    /// Stream carries 10-bit HDR content.
    pub hdr: bool,
    /// Stream is full-chroma 4:4:4.
    pub yuv444: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl StreamParameters {
    pub fn new(codec: VideoCodec, width: u32, height: u32, max_fps: u32) -> Self {
        Self {
            codec,
            width,
            height,
            max_fps,
            hdr: false,
            yuv444: false,
            window_width: width,
            window_height: height,
        }
    }

    pub fn with_window(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn with_hdr(mut self, hdr: bool) -> Self {
        self.hdr = hdr;
        self
    }

    pub fn with_yuv444(mut self, yuv444: bool) -> Self {
        self.yuv444 = yuv444;
        self
    }
}
