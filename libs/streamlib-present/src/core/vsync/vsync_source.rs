// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Vsync source contract.
//!
//! A vsync source abstracts the platform's display refresh signal. Two shapes
//! exist:
//!
//! - **Blocking** (`is_async() == false`): the pacer's vsync thread calls
//!   [`VsyncSource::wait_for_vsync`], which returns at the next refresh.
//! - **Asynchronous** (`is_async() == true`): the source delivers ticks from
//!   its own context (display link callback, compositor frame event) by calling
//!   [`VsyncSignal::notify`]. The vsync thread waits on a condition variable.

use std::sync::{Arc, Weak};

use crate::core::{Result, StreamError};

/// Receiver of asynchronous vsync ticks.
pub trait VsyncListener: Send + Sync {
    fn on_vsync(&self);
}

/// Handle an asynchronous source uses to deliver ticks.
///
/// Holds the listener weakly so a source thread never keeps the pacer alive.
#[derive(Clone)]
pub struct VsyncSignal {
    listener: Weak<dyn VsyncListener>,
}

impl VsyncSignal {
    pub fn new(listener: &Arc<dyn VsyncListener>) -> Self {
        Self {
            listener: Arc::downgrade(listener),
        }
    }

    /// Deliver one tick. Returns `false` once the listener is gone.
    pub fn notify(&self) -> bool {
        match self.listener.upgrade() {
            Some(listener) => {
                listener.on_vsync();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for VsyncSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VsyncSignal")
            .field("alive", &(self.listener.strong_count() > 0))
            .finish()
    }
}

pub trait VsyncSource: Send {
    /// Whether ticks arrive through [`VsyncSignal`] rather than [`wait_for_vsync`](Self::wait_for_vsync).
    fn is_async(&self) -> bool;

    /// Refresh rate this source ticks at, if it knows it.
    fn refresh_rate_hz(&self) -> Option<u32> {
        None
    }

    /// Begin producing ticks. Failure disables pacing for the session.
    fn start(&mut self, signal: VsyncSignal) -> Result<()>;

    /// Block until the next refresh. Only called on blocking sources.
    fn wait_for_vsync(&mut self) -> Result<()> {
        Err(StreamError::NotSupported(
            "wait_for_vsync on an asynchronous vsync source".into(),
        ))
    }

    /// Stop producing ticks. Called once, after the vsync thread has exited.
    fn stop(&mut self) {}
}
