// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Software vsync sources driven by a monotonic deadline schedule.
//!
//! ## How It Works
//!
//! Tick `n` is due at `epoch + n * period`. Waiting sleeps to the next due
//! deadline rather than for a fixed period, so scheduling jitter in one tick
//! does not accumulate into drift. If the caller falls more than one period
//! behind, missed ticks are skipped instead of being delivered back-to-back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{VsyncSignal, VsyncSource};
use crate::core::{Result, StreamError};

#[derive(Debug)]
struct TickSchedule {
    epoch: Instant,
    period_nanos: u64,
    ticks: u64,
}

impl TickSchedule {
    fn new(refresh_rate_hz: u32) -> Self {
        let period = Duration::from_secs(1) / refresh_rate_hz.max(1);
        Self {
            epoch: Instant::now(),
            period_nanos: u64::try_from(period.as_nanos()).unwrap_or(u64::MAX).max(1),
            ticks: 0,
        }
    }

    fn due(&self, tick: u64) -> Instant {
        self.epoch + Duration::from_nanos(self.period_nanos.saturating_mul(tick))
    }

    /// Deadline of the next tick, skipping any already in the past.
    fn next_deadline(&mut self, now: Instant) -> Instant {
        self.ticks += 1;
        let mut deadline = self.due(self.ticks);
        if deadline < now {
            let elapsed = now.duration_since(self.epoch).as_nanos();
            let elapsed = u64::try_from(elapsed).unwrap_or(u64::MAX);
            self.ticks = elapsed / self.period_nanos + 1;
            deadline = self.due(self.ticks);
        }
        deadline
    }
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        std::thread::sleep(deadline - now);
    }
}

/// Blocking vsync source ticking at a fixed refresh rate.
#[derive(Debug)]
pub struct TimerVsyncSource {
    refresh_rate_hz: u32,
    schedule: Option<TickSchedule>,
}

impl TimerVsyncSource {
    pub fn new(refresh_rate_hz: u32) -> Self {
        Self {
            refresh_rate_hz,
            schedule: None,
        }
    }

    /// Ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.schedule.as_ref().map(|s| s.ticks).unwrap_or(0)
    }
}

impl VsyncSource for TimerVsyncSource {
    fn is_async(&self) -> bool {
        false
    }

    fn refresh_rate_hz(&self) -> Option<u32> {
        Some(self.refresh_rate_hz)
    }

    fn start(&mut self, _signal: VsyncSignal) -> Result<()> {
        if self.refresh_rate_hz == 0 {
            return Err(StreamError::Vsync("refresh rate must be non-zero".into()));
        }
        self.schedule = Some(TickSchedule::new(self.refresh_rate_hz));
        Ok(())
    }

    fn wait_for_vsync(&mut self) -> Result<()> {
        let schedule = self
            .schedule
            .as_mut()
            .ok_or_else(|| StreamError::Vsync("timer vsync source not started".into()))?;
        let deadline = schedule.next_deadline(Instant::now());
        sleep_until(deadline);
        Ok(())
    }
}

/// Asynchronous vsync source: a ticker thread delivers each refresh through
/// [`VsyncSignal::notify`], the way a display-link callback would.
pub struct ThreadedVsyncSource {
    refresh_rate_hz: u32,
    running: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
}

impl ThreadedVsyncSource {
    pub fn new(refresh_rate_hz: u32) -> Self {
        Self {
            refresh_rate_hz,
            running: Arc::new(AtomicBool::new(false)),
            ticker: None,
        }
    }
}

impl VsyncSource for ThreadedVsyncSource {
    fn is_async(&self) -> bool {
        true
    }

    fn refresh_rate_hz(&self) -> Option<u32> {
        Some(self.refresh_rate_hz)
    }

    fn start(&mut self, signal: VsyncSignal) -> Result<()> {
        if self.refresh_rate_hz == 0 {
            return Err(StreamError::Vsync("refresh rate must be non-zero".into()));
        }
        if self.ticker.is_some() {
            return Err(StreamError::Vsync("vsync ticker already running".into()));
        }

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let mut schedule = TickSchedule::new(self.refresh_rate_hz);

        let ticker = std::thread::Builder::new()
            .name("vsync-ticker".into())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    sleep_until(schedule.next_deadline(Instant::now()));
                    if !running.load(Ordering::Acquire) || !signal.notify() {
                        break;
                    }
                }
                tracing::debug!("Vsync ticker exiting after {} ticks", schedule.ticks);
            })
            .map_err(|e| StreamError::Vsync(format!("Failed to spawn vsync ticker: {}", e)))?;

        self.ticker = Some(ticker);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(ticker) = self.ticker.take() {
            if ticker.join().is_err() {
                tracing::error!("Vsync ticker thread panicked");
            }
        }
    }
}

impl Drop for ThreadedVsyncSource {
    fn drop(&mut self) {
        self.stop();
    }
}
