//! Tracing subscriber setup.
//!
//! - `QUIZFORGE_LOG` holds the filter directives (e.g. `debug` or
//!   `info,quizforge_core=trace`).
//! - `QUIZFORGE_LOG_FORMAT=json` switches to structured JSON lines.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "QUIZFORGE_LOG";
pub const LOG_FORMAT_ENV: &str = "QUIZFORGE_LOG_FORMAT";
pub const DEFAULT_DIRECTIVES: &str = "info,quizforge_core=debug,quizforge_store=debug";

/// Install the global fmt subscriber.
///
/// Fails instead of panicking when a subscriber is already installed, so
/// hosts and tests can call it more than once.
pub fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    let installed = match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => builder.json().try_init(),
        _ => builder.try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_an_error_not_a_panic() {
        // The first call may already fail if another test got there first.
        let _ = init_tracing();
        assert!(init_tracing().is_err());
    }
}
