// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use bitflags::bitflags;

bitflags! {
    /// Capabilities and constraints a renderer advertises to the pacer and
    /// the session layer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RendererAttributes: u32 {
        /// Only usable in fullscreen.
        const FULLSCREEN_ONLY = 0x01;
        /// Cannot present above 1080p.
        const MAX_1080P = 0x02;
        const HDR_SUPPORT = 0x04;
        /// Render queue keeps one frame of slack instead of zero.
        const NO_BUFFERING = 0x08;
        /// Pacing must stay on regardless of user preference.
        const FORCE_PACING = 0x10;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values_are_stable() {
        assert_eq!(RendererAttributes::NO_BUFFERING.bits(), 0x08);
        let attrs = RendererAttributes::HDR_SUPPORT | RendererAttributes::FORCE_PACING;
        assert_eq!(attrs.bits(), 0x14);
        assert!(attrs.contains(RendererAttributes::FORCE_PACING));
        assert!(!attrs.contains(RendererAttributes::NO_BUFFERING));
    }
}
