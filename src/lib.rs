pub mod config;
pub mod models;
pub mod normalize;
pub mod status; // medication lifecycle: active/completed + days remaining
pub mod dedup; // content hashing for cross-user duplicate detection
pub mod ledger;
pub mod extraction;
pub mod db;
pub mod storage;
pub mod upload; // upload workflow: extract → check → store → persist → register
pub mod dashboard;
pub mod session;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the embedding application.
///
/// Reads `RUST_LOG` if set, otherwise falls back to the default filter.
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::info!("Medifolio core starting v{}", config::APP_VERSION);
}
