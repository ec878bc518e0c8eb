// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod config;
pub mod error;
pub mod events;
pub mod frames;
pub mod logging;
pub mod pacer;
pub mod renderer;
pub mod vsync;

pub use error::{InitFailureReason, Result, StreamError};
