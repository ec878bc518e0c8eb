// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Events crossing from the presentation pipeline to the application layer.

use crossbeam_channel::{Receiver, Sender};

/// Why the renderer asks the application to rebuild it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetReason {
    /// Present failed with a device-removed class error.
    DeviceLost,
    WindowResized,
    DisplayHdrChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentEvent {
    /// A frame is waiting in the render queue and no render thread exists.
    /// The application should call `Pacer::render_on_main_thread`.
    RenderFrameReady,
    /// Render targets are invalid. Tear the renderer down and build a new one.
    RenderTargetsReset(ResetReason),
}

/// Sending half handed to the pacer and the renderer.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<PresentEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the application polls.
    pub fn channel() -> (Self, Receiver<PresentEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    /// Post an event. A dropped receiver only means nobody is listening.
    pub fn post(&self, event: PresentEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Present event dropped, receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_is_delivered_in_order() {
        let (sink, rx) = EventSink::channel();
        sink.post(PresentEvent::RenderFrameReady);
        sink.post(PresentEvent::RenderTargetsReset(ResetReason::DeviceLost));

        assert_eq!(rx.try_recv().unwrap(), PresentEvent::RenderFrameReady);
        assert_eq!(
            rx.try_recv().unwrap(),
            PresentEvent::RenderTargetsReset(ResetReason::DeviceLost)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_post_without_receiver_does_not_panic() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.post(PresentEvent::RenderFrameReady);
    }
}
