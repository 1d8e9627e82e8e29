//! Logging setup
//!
//! Installs a global `tracing` fmt subscriber. The filter comes from the
//! `FOS_LOG` environment variable when set, otherwise from the directive
//! the caller passes (usually [`Config::log_filter`](crate::Config)).

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "FOS_LOG";

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok()
}
