//! Diagnostic logging to standard error

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise warnings only, or debug output for
/// fnctl crates when `verbose` is on.
pub fn init(verbose: bool) {
    let default = if verbose {
        "warn,fnctl=debug,fnctl_core=debug,fnctl_deploy=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .compact(),
        )
        .try_init();
}
