// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Frame pacing between the decoder and the renderer.

mod deferred_free;
mod drop_policy;
#[allow(clippy::module_inception)]
mod pacer;
mod pacer_core;
mod stats;

pub use deferred_free::DeferredFreeRing;
pub use drop_policy::{DropPolicy, EnqueueDrops, RelaxationState};
pub use pacer::Pacer;
pub use pacer_core::{PacerCore, VsyncOutcome};
pub use stats::PacerStats;
