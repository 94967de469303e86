//! Stand-in processes for exercising runexp.
//!
//! Each module backs one binary: `fake-train` prints deterministic metrics,
//! `check-csv` summarises a result file and `interrupt-probe` sleeps until
//! it completes or is interrupted.

pub mod inspect;
pub mod probe;
pub mod train;

/// Exit status after SIGINT, as a shell would report it.
pub const EXIT_INTERRUPTED: u8 = 130;

/// Install the fmt subscriber used by all fixture binaries.
///
/// Logs go to stderr so stdout carries only the lines a sweep scrapes.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .init();
}
