pub mod args;
pub mod commands;
pub mod plain;

use tracing_subscriber::EnvFilter;

/// Exit codes for different error conditions
pub mod exit_codes {
    /// Successful execution
    pub const SUCCESS: u8 = 0;
    /// The transport could not be opened and retries were exhausted
    pub const NETWORK_ERROR: u8 = 1;
    /// Invalid arguments (malformed heartbeat, empty destination)
    pub const USAGE_ERROR: u8 = 2;
}

/// Log to stderr. `RUST_LOG` wins over `--log`.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
