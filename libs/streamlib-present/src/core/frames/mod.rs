// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Decoded frames, the decoder buffer pool, and the queue primitives the
//! pacer is built from.

mod frame;
mod frame_pool;
mod frame_queue;
mod queue_history;

pub use frame::{
    ChromaLocation, ColorRange, ColorSpace, Frame, FrameBacking, FrameDescriptor, PixelFormat,
    SurfaceId,
};
pub use frame_pool::{
    FramePool, FramePoolConfig, FramePoolExhaustionPolicy, FramePoolStats, PooledFrameSlot,
};
pub use frame_queue::FrameQueue;
pub use queue_history::QueueHistory;
