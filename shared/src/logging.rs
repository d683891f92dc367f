//! Diagnostic logging setup for host binaries and tests.

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("a global subscriber is already installed: {0}")]
    AlreadyInitialized(String),

    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
}

/// Install a console subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Only the first call in a process succeeds.
pub fn init_tracing(default_filter: &str) -> Result<(), LoggingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(default_filter, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        // Other tests in this binary may have installed one already.
        let _ = init_tracing("recycle_scan=debug");
        assert!(matches!(
            init_tracing("info"),
            Err(LoggingError::AlreadyInitialized(_))
        ));
    }
}
