//! Shared `tracing` setup for the binaries in this workspace.

use tracing::metadata::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global subscriber that writes to stderr. `RUST_LOG` takes precedence over
/// `default_level`.
///
/// Logs go to stderr so they never interleave with the interactive prompts on stdout.
pub fn configure(default_level: LevelFilter) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();
}

/// Parses a level name such as `"debug"` or `"off"`, falling back to `INFO` for anything
/// unrecognised.
pub fn level_from_str(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::INFO)
}
