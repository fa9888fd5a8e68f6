//! Logging setup.
//!
//! Library code only emits `tracing` events. Binaries call [`init`] once to
//! print them on stderr, filtered by [`Settings::log_filter`].

use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;
use crate::settings::Settings;

/// Installs a stderr `fmt` subscriber filtered by the settings.
///
/// Returns `Ok(false)` if a global subscriber was already installed, which
/// is not an error: tests and embedding applications may own the subscriber.
pub fn init(settings: &Settings) -> Result<bool, ConfigError> {
    let filter = filter(&settings.log_filter)?;
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok())
}

fn filter(directives: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(directives).map_err(|e| ConfigError::InvalidLogFilter {
        value: directives.to_string(),
        reason: e.to_string(),
    })
}
