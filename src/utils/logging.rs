//! Logging setup for the router binary.

use tracing::{Level, warn};

use crate::config::LogSettings;

/// Level named by `name`, case-insensitively. `warning` is accepted for `warn`.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "warning" => Some(Level::WARN),
        other => other.parse().ok(),
    }
}

/// Install the global `fmt` subscriber at the configured level. An unknown
/// level logs at `info` and says so. Later calls are no-ops.
pub fn init(settings: &LogSettings) {
    let level = parse_level(&settings.level);

    let installed = tracing_subscriber::fmt()
        .with_max_level(level.unwrap_or(Level::INFO))
        .with_target(false)
        .try_init()
        .is_ok();

    if installed && level.is_none() {
        warn!(level = %settings.level, "unknown log level, logging at info");
    }
}
