//! Thin wrapper around `sloggers`/`slog` so the rest of the workspace only
//! ever imports `common::logging` and never has to know which backend built
//! the `Logger`.
pub use slog::{debug, error, info, o, trace, warn, Logger};

use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

/// Builds the root logger for the process. `verbose` maps to `Severity::Debug`,
/// otherwise the proxy logs at `Severity::Info`, matching the terminal/stderr
/// config the teacher hardcoded in `flux::logging::init`.
pub fn init(verbose: bool) -> Logger {
    let mut builder = TerminalLoggerBuilder::new();
    builder.destination(Destination::Stderr);
    builder.level(if verbose {
        Severity::Debug
    } else {
        Severity::Info
    });

    builder.build().expect("failed building root logger")
}
