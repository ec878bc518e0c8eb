// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use parking_lot::Mutex;

use super::{VsyncSignal, VsyncSource};
use crate::core::Result;

/// Asynchronous vsync source ticked by the embedder, e.g. from a compositor
/// frame callback.
#[derive(Default)]
pub struct ManualVsyncSource {
    refresh_rate_hz: Option<u32>,
    signal: Arc<Mutex<Option<VsyncSignal>>>,
}

/// Cloneable trigger for a [`ManualVsyncSource`].
#[derive(Clone)]
pub struct ManualVsyncTrigger {
    signal: Arc<Mutex<Option<VsyncSignal>>>,
}

impl ManualVsyncSource {
    pub fn new(refresh_rate_hz: Option<u32>) -> Self {
        Self {
            refresh_rate_hz,
            signal: Arc::new(Mutex::new(None)),
        }
    }

    pub fn trigger(&self) -> ManualVsyncTrigger {
        ManualVsyncTrigger {
            signal: Arc::clone(&self.signal),
        }
    }
}

impl ManualVsyncTrigger {
    /// Deliver one tick. Returns `false` if the source is not started or its
    /// listener is gone.
    pub fn tick(&self) -> bool {
        self.signal
            .lock()
            .as_ref()
            .map(VsyncSignal::notify)
            .unwrap_or(false)
    }
}

impl VsyncSource for ManualVsyncSource {
    fn is_async(&self) -> bool {
        true
    }

    fn refresh_rate_hz(&self) -> Option<u32> {
        self.refresh_rate_hz
    }

    fn start(&mut self, signal: VsyncSignal) -> Result<()> {
        *self.signal.lock() = Some(signal);
        Ok(())
    }

    fn stop(&mut self) {
        self.signal.lock().take();
    }
}
