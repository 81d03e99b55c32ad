//! Logging bootstrap.

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `ledgerseal=debug`.
pub const LOG_ENV: &str = "LEDGERSEAL_LOG";

/// Install the stderr fmt subscriber.
///
/// `verbosity` is the number of `-v` flags and only applies when `LEDGERSEAL_LOG`
/// is unset. Safe to call more than once; later calls are no-ops.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("ledgerseal={}", level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
