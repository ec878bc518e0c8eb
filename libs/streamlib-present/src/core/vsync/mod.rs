// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod manual_vsync;
mod timer_vsync;
mod vsync_source;

pub use manual_vsync::{ManualVsyncSource, ManualVsyncTrigger};
pub use timer_vsync::{ThreadedVsyncSource, TimerVsyncSource};
pub use vsync_source::{VsyncListener, VsyncSignal, VsyncSource};
