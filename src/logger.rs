//! Tracing setup for the switching-chain binary and the benches.
//!
//! The default filter only opens this crate (and the binary) at the chosen
//! level and keeps every dependency at WARN, so `debug` output is the
//! per-step elimination trace and not rayon or clap internals. `RUST_LOG`
//! replaces the default filter entirely.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Targets opened at the default level.
const CRATE_TARGETS: [&str; 2] = ["hybrid_solver", "switching_chain"];

/// Install the subscriber at INFO for this crate.
///
/// ```no_run
/// hybrid_solver::init_logger();
/// tracing::info!("switching chain started");
/// ```
///
/// Per-module tracing, e.g. the partial QR of every branch:
/// ```bash
/// RUST_LOG=hybrid_solver::linalg=trace cargo run --bin switching_chain
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Install the subscriber with `default_level` for this crate's targets.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init_logger_with_level(default_level: Level) {
    use tracing_subscriber::fmt::time::SystemTime;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        // rayon workers show up when branches are eliminated in parallel
        .with_thread_ids(true)
        .with_thread_names(false)
        .try_init()
        .ok();
}

fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = String::from("warn");
    for target in CRATE_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}
