//! Tracing bootstrap for hosts.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with an env-filter.
///
/// Defaults to `sightline=info` when `RUST_LOG` is unset. Safe to call more
/// than once; later calls are no-ops.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sightline=info"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(true)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(env_filter)
        .try_init();
}
