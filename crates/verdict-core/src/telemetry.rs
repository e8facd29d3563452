//! Tracing initialisation for verdict binaries.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored
//! because the global subscriber can only be set once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable that forces JSON log lines when set to `json`.
pub const LOG_FORMAT_ENV: &str = "VERDICT_LOG_FORMAT";

/// Initialise the global tracing subscriber.
///
/// * `json` requests newline-delimited JSON output. Setting
///   `VERDICT_LOG_FORMAT=json` has the same effect.
/// * `level` is the default verbosity when `RUST_LOG` is not set.
///
/// Logs go to stderr so the CLI can keep stdout for results.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let json = json || json_requested_by_env();

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
            .ok();
    }
}

fn json_requested_by_env() -> bool {
    std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
