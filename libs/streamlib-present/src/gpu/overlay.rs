// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! On-screen statistics overlays.
//!
//! Updates arrive from any reporting thread while the render thread may be
//! drawing the current overlays. An update uploads the new surface first,
//! then swaps it in under a short spinlock and frees the old resources after
//! the lock is released, so the render thread never waits on an upload.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use super::device::GpuCommand;
use super::fence::FenceChannel;
use super::texture::{OutputRect, TextureId};
use crate::core::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    /// Performance statistics, top-left.
    Debug,
    /// Connection status messages, bottom-left.
    StatusUpdate,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 2] = [OverlayKind::Debug, OverlayKind::StatusUpdate];

    fn slot(&self) -> usize {
        match self {
            Self::Debug => 0,
            Self::StatusUpdate => 1,
        }
    }
}

/// RGBA8 overlay image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySurface {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Source of overlay images, typically the statistics UI.
pub trait OverlayProvider: Send + Sync {
    /// Take the latest surface for `kind`, if it changed.
    fn updated_surface(&self, kind: OverlayKind) -> Option<OverlaySurface>;

    fn is_enabled(&self, kind: OverlayKind) -> bool;
}

/// Uploads overlay surfaces on the overlay engine.
pub trait OverlayUploader: Send + Sync {
    fn upload(&self, surface: &OverlaySurface) -> Result<TextureId>;

    fn release(&self, texture: TextureId);
}

struct OverlayResources {
    texture: TextureId,
    width: u32,
    height: u32,
    uploader: Arc<dyn OverlayUploader>,
}

impl Drop for OverlayResources {
    fn drop(&mut self) {
        self.uploader.release(self.texture);
    }
}

const SPIN_LIMIT: u32 = 64;

/// Spin briefly, then yield. Only ever held for a pointer swap or snapshot.
struct SpinLock {
    locked: AtomicBool,
}

struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl SpinLock {
    const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> SpinGuard<'_> {
        let mut spins = 0u32;
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            if spins < SPIN_LIMIT {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
            spins = spins.wrapping_add(1);
        }
        SpinGuard { lock: self }
    }
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

pub struct OverlayManager {
    provider: Arc<dyn OverlayProvider>,
    uploader: Arc<dyn OverlayUploader>,
    fence: Mutex<FenceChannel>,
    slots: [ArcSwapOption<OverlayResources>; 2],
    swap_lock: SpinLock,
    accepting: AtomicBool,
}

impl OverlayManager {
    pub fn new(
        provider: Arc<dyn OverlayProvider>,
        uploader: Arc<dyn OverlayUploader>,
        fence: FenceChannel,
    ) -> Self {
        Self {
            provider,
            uploader,
            fence: Mutex::new(fence),
            slots: [ArcSwapOption::empty(), ArcSwapOption::empty()],
            swap_lock: SpinLock::new(),
            accepting: AtomicBool::new(false),
        }
    }

    /// Gate updates. Closed until the pipeline is initialized and again while it tears down.
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::Release);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Pull the provider's latest surface for `kind` and swap it in.
    pub fn notify_overlay_updated(&self, kind: OverlayKind) -> Result<()> {
        if !self.is_accepting() {
            tracing::trace!("Overlay {:?} update skipped, not accepting", kind);
            return Ok(());
        }

        let replacement = if self.provider.is_enabled(kind) {
            match self.provider.updated_surface(kind) {
                Some(surface) => Some(Arc::new(self.upload(&surface)?)),
                None => None,
            }
        } else {
            None
        };

        let old = {
            let _guard = self.swap_lock.lock();
            self.slots[kind.slot()].swap(replacement)
        };
        drop(old);
        Ok(())
    }

    fn upload(&self, surface: &OverlaySurface) -> Result<OverlayResources> {
        let texture = self.uploader.upload(surface)?;
        let resources = OverlayResources {
            texture,
            width: surface.width,
            height: surface.height,
            uploader: Arc::clone(&self.uploader),
        };

        let mut fence = self.fence.lock();
        let ticket = fence.signal()?;
        fence.wait_cpu(ticket)?;
        Ok(resources)
    }

    /// Draw commands for every visible overlay on `target`.
    pub fn draw_commands(&self, target: TextureId, display: OutputRect) -> Vec<GpuCommand> {
        let snapshot = {
            let _guard = self.swap_lock.lock();
            [self.slots[0].load_full(), self.slots[1].load_full()]
        };

        let mut commands = Vec::new();
        for kind in OverlayKind::ALL {
            let Some(res) = &snapshot[kind.slot()] else {
                continue;
            };
            if !self.provider.is_enabled(kind) {
                continue;
            }
            let top = match kind {
                OverlayKind::Debug => display.top,
                OverlayKind::StatusUpdate => {
                    (display.top + display.height).saturating_sub(res.height)
                }
            };
            commands.push(GpuCommand::DrawOverlay {
                overlay: res.texture,
                target,
                left: display.left,
                top,
                width: res.width,
                height: res.height,
            });
        }
        commands
    }

    pub fn has_overlay(&self, kind: OverlayKind) -> bool {
        self.slots[kind.slot()].load().is_some()
    }

    /// Release every overlay.
    pub fn clear(&self) {
        let old = {
            let _guard = self.swap_lock.lock();
            [self.slots[0].swap(None), self.slots[1].swap(None)]
        };
        drop(old);
    }
}

impl Drop for OverlayManager {
    fn drop(&mut self) {
        self.clear();
    }
}
