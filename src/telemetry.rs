//! Operator-facing log output setup for embedding binaries.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global subscriber for agent log output.
///
/// `quiet` keeps only warnings and errors on the console; captured run logs
/// still reach the report either way. Honors `RUST_LOG` when set. Calling
/// this twice is harmless; the second installation is ignored.
pub fn init(quiet: bool) {
    let default_directive = if quiet {
        "converge_agent=warn"
    } else {
        "converge_agent=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
