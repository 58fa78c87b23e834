//! Logging setup for the binary.
//!
//! Diagnostics go to stderr so command output on stdout stays clean. `-v`
//! raises the level one step per flag; `RUST_LOG` overrides it entirely.

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Map the `-v` count to a level. Warnings are always shown.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Filter used when `RUST_LOG` is unset: the library and the `tf` binary
/// log under separate targets.
pub fn default_directives(verbosity: u8) -> String {
    let level = level_for(verbosity);
    format!("taskforest={level},tf={level}")
}

/// Install the global subscriber. Returns an error if one is already set.
pub fn init(verbosity: u8) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}
