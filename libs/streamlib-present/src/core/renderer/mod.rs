// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod attributes;
mod params;
mod renderer_trait;

pub use attributes::RendererAttributes;
pub use params::{StreamParameters, VideoCodec};
pub use renderer_trait::Renderer;
