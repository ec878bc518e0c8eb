// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

/// Why a renderer backend refused to initialize.
///
/// The caller uses this to decide which alternative backend to try next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitFailureReason {
    Unknown,
    /// The adapter cannot decode or present this stream in hardware.
    NoHardwareSupport,
    /// No software fallback exists for this configuration.
    NoSoftwareSupport,
}

impl std::fmt::Display for InitFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::NoHardwareSupport => "no hardware support",
            Self::NoSoftwareSupport => "no software support",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum StreamError {
    /// A single command-list close/execute failed. Absorbed per frame.
    #[error("GPU submission failed: {0}")]
    GpuSubmission(String),

    /// Present reported a device-removed class failure.
    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    #[error("Capability probe failed: {0}")]
    CapabilityProbe(String),

    #[error("Renderer initialization failed ({reason}): {message}")]
    RendererInit {
        reason: InitFailureReason,
        message: String,
    },

    #[error("Fence operation failed: {0}")]
    Fence(String),

    #[error("Vsync source error: {0}")]
    Vsync(String),

    #[error("Frame pool error: {0}")]
    FramePool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StreamError {
    pub fn init(reason: InitFailureReason, message: impl Into<String>) -> Self {
        Self::RendererInit {
            reason,
            message: message.into(),
        }
    }

    /// Whether this error invalidates the whole rendering session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::DeviceLost(_) | Self::RendererInit { .. })
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_error_message_carries_reason() {
        let err = StreamError::init(InitFailureReason::NoHardwareSupport, "no video processor");
        assert_eq!(
            err.to_string(),
            "Renderer initialization failed (no hardware support): no video processor"
        );
        assert!(err.is_session_fatal());
    }

    #[test]
    fn test_transient_errors_are_not_fatal() {
        assert!(!StreamError::GpuSubmission("close failed".into()).is_session_fatal());
        assert!(StreamError::DeviceLost("removed".into()).is_session_fatal());
    }

    #[test]
    fn test_anyhow_passthrough() {
        let err: StreamError = anyhow::anyhow!("backend exploded").into();
        assert_eq!(err.to_string(), "backend exploded");
    }
}
