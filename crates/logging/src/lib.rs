//! Verbosity control and `tracing` subscriber installation shared by every
//! binary and crate in the workspace.
//!
//! # Overview
//! [`init`] installs a [`tracing_subscriber::fmt`] subscriber writing to
//! stderr. [`Verbosity::Quiet`] raises the minimum level to `WARN` so a
//! `--quiet` invocation only ever prints failures; [`Verbosity::Normal`]
//! leaves `INFO` and above visible, which is what the orchestrator's
//! per-second stats and transfer summary rely on.
//!
//! # Non-goals
//! This crate does not offer per-module filtering or a `--verbose` level
//! above `Normal`; every other crate logs through `tracing::{info, warn,
//! error, debug}` rather than choosing its own subscriber.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Output verbosity requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Only warnings and errors.
    Quiet,
    /// Informational progress plus warnings and errors.
    #[default]
    Normal,
}

impl Verbosity {
    fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::WARN,
            Self::Normal => LevelFilter::INFO,
        }
    }
}

/// Installs the process-wide `tracing` subscriber.
///
/// Safe to call more than once in a test binary; later calls are ignored
/// rather than panicking, since `tracing`'s global dispatcher can only be
/// set a single time per process.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.level_filter().into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_raises_minimum_level_to_warn() {
        assert_eq!(Verbosity::Quiet.level_filter(), LevelFilter::WARN);
        assert_eq!(Verbosity::Normal.level_filter(), LevelFilter::INFO);
    }

    #[test]
    fn init_does_not_panic_when_called_repeatedly() {
        init(Verbosity::Normal);
        init(Verbosity::Quiet);
    }
}
