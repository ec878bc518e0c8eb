// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Process-wide tracing subscriber setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Install the global subscriber: `RUST_LOG` filter (falling back to
/// `default_directive`) plus a formatted stderr layer.
///
/// Returns `Ok(false)` if a global subscriber was already installed.
pub fn init_logging(default_directive: &str) -> crate::core::Result<bool> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive).map_err(|e| {
            crate::core::StreamError::Configuration(format!(
                "Invalid log directive '{}': {}",
                default_directive, e
            ))
        })?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .with_target(true);

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialized (default directive: {})", default_directive);
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        let _ = init_logging("debug");
        assert!(!init_logging("info").unwrap());
    }

    #[test]
    fn test_invalid_directive_rejected_when_env_unset() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert!(init_logging("streamlib_present=notalevel").is_err());
    }
}
