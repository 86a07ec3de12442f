use std::str::FromStr;

use tracing::level_filters::LevelFilter;

/// Installs the global `tracing` subscriber and returns the level in effect.
///
/// Only the first call installs anything, later calls are no-ops.
pub fn init(level: &str) -> LevelFilter {
    let filter = parse_level(level);
    let _ = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .try_init();
    filter
}

/// `off`, `error`, `warn` (or `warning`), `info`, `debug`, `trace`, any case.
/// Unknown names fall back to `info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => LevelFilter::WARN,
        other => LevelFilter::from_str(other).unwrap_or(LevelFilter::INFO),
    }
}
