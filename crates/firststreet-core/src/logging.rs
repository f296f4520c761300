//! Logging init for binaries and integration harnesses embedding the engine.

use tracing_subscriber::EnvFilter;

use crate::error::CoreError;

pub const DEFAULT_FILTER: &str = "info,firststreet_core=debug";

/// Installs a stderr fmt subscriber filtered by `RUST_LOG`
/// (default [`DEFAULT_FILTER`]).
///
/// Returns [`CoreError::Logging`] when a global subscriber is already set.
pub fn init_logging() -> Result<(), CoreError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|e| CoreError::Logging(e.to_string()))?;

    tracing::debug!("firststreet logging initialized");
    Ok(())
}
