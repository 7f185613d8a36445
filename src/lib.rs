//! ITR filing pipeline: document text in, a verified ITR-1 return (or a run
//! held for review) out.

pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod rules;

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber. Stdout stays free for command output.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
