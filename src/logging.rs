//! Logging prelude module for convenient access to tracing macros.
//!
//! Re-exports the common tracing macros so modules can `use
//! crate::logging::*;` instead of depending on `tracing` directly.

pub use tracing::{debug, error, info, trace, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// By default, logs at INFO level and above are displayed. Control the log
/// level with the `RUST_LOG` environment variable:
///
/// ```bash
/// RUST_LOG=debug cargo run
/// RUST_LOG=drivesync=trace cargo run
/// RUST_LOG=drivesync::executor=debug,drivesync::scan=trace cargo run
/// ```
pub fn init_tracing() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_writer(std::io::stderr)
		.init();
}

// vim: ts=4
