// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! FramePool - the decoder's fixed set of output buffers.
//!
//! Every queued, rendering or deferred frame holds one slot. A decoder that
//! cannot get a slot stalls, which is why the queues bound how many frames
//! they keep in flight.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::{Result, StreamError};

/// Policy for handling pool exhaustion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FramePoolExhaustionPolicy {
    /// Block and wait for a slot to be released.
    Block { timeout_ms: u64 },
    /// Return an error immediately.
    ReturnError,
}

impl Default for FramePoolExhaustionPolicy {
    fn default() -> Self {
        Self::Block { timeout_ms: 1000 }
    }
}

#[derive(Clone, Debug)]
pub struct FramePoolConfig {
    pub capacity: usize,
    pub exhaustion_policy: FramePoolExhaustionPolicy,
}

impl Default for FramePoolConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            exhaustion_policy: FramePoolExhaustionPolicy::default(),
        }
    }
}

/// Statistics about pool usage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FramePoolStats {
    pub capacity: usize,
    pub in_use: usize,
    pub available: usize,
    pub total_acquired: u64,
}

struct PoolState {
    free: Vec<u32>,
    total_acquired: u64,
}

struct FramePoolInner {
    state: Mutex<PoolState>,
    available_condvar: Condvar,
    config: FramePoolConfig,
}

impl FramePoolInner {
    fn release(&self, index: u32) {
        let mut state = self.state.lock();
        state.free.push(index);
        self.available_condvar.notify_one();
    }

    fn try_take(self: &Arc<Self>, state: &mut PoolState) -> Option<PooledFrameSlot> {
        let index = state.free.pop()?;
        state.total_acquired += 1;
        Some(PooledFrameSlot {
            pool: Arc::clone(self),
            index,
        })
    }
}

/// Handle to a pool slot. Returns the slot to the pool on Drop.
pub struct PooledFrameSlot {
    pool: Arc<FramePoolInner>,
    index: u32,
}

impl PooledFrameSlot {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl Drop for PooledFrameSlot {
    fn drop(&mut self) {
        self.pool.release(self.index);
    }
}

impl std::fmt::Debug for PooledFrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledFrameSlot")
            .field("index", &self.index)
            .finish()
    }
}

/// The public frame pool API.
#[derive(Clone)]
pub struct FramePool {
    inner: Arc<FramePoolInner>,
}

impl FramePool {
    /// Create a pool with `capacity` slots that blocks for up to a second when exhausted.
    pub fn new(capacity: usize) -> Self {
        Self::with_config(FramePoolConfig {
            capacity,
            ..Default::default()
        })
    }

    pub fn with_config(config: FramePoolConfig) -> Self {
        let free = (0..config.capacity as u32).rev().collect();
        Self {
            inner: Arc::new(FramePoolInner {
                state: Mutex::new(PoolState {
                    free,
                    total_acquired: 0,
                }),
                available_condvar: Condvar::new(),
                config,
            }),
        }
    }

    /// Acquire a slot, applying the exhaustion policy if none is free.
    pub fn acquire(&self) -> Result<PooledFrameSlot> {
        let mut state = self.inner.state.lock();
        if let Some(slot) = self.inner.try_take(&mut state) {
            return Ok(slot);
        }

        match &self.inner.config.exhaustion_policy {
            FramePoolExhaustionPolicy::ReturnError => Err(StreamError::FramePool(
                "Frame pool exhausted (no available slots)".into(),
            )),
            FramePoolExhaustionPolicy::Block { timeout_ms } => {
                let deadline = Instant::now() + Duration::from_millis(*timeout_ms);
                loop {
                    if self
                        .inner
                        .available_condvar
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        // One more look before giving up.
                        return self.inner.try_take(&mut state).ok_or_else(|| {
                            StreamError::FramePool(format!(
                                "Frame pool exhausted (timeout after {}ms)",
                                timeout_ms
                            ))
                        });
                    }
                    if let Some(slot) = self.inner.try_take(&mut state) {
                        return Ok(slot);
                    }
                }
            }
        }
    }

    /// Acquire a slot without waiting.
    pub fn try_acquire(&self) -> Option<PooledFrameSlot> {
        let mut state = self.inner.state.lock();
        self.inner.try_take(&mut state)
    }

    pub fn stats(&self) -> FramePoolStats {
        let state = self.inner.state.lock();
        let capacity = self.inner.config.capacity;
        FramePoolStats {
            capacity,
            in_use: capacity - state.free.len(),
            available: state.free.len(),
            total_acquired: state.total_acquired,
        }
    }
}

impl std::fmt::Debug for FramePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("FramePool")
            .field("capacity", &stats.capacity)
            .field("in_use", &stats.in_use)
            .field("available", &stats.available)
            .finish()
    }
}
