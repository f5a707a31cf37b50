//! Webhook receiver binary.
//!
//! Serves the health, echo and webhook routes until SIGINT or SIGTERM, then
//! drains in-flight requests. Exits 0 after a clean drain and 1 when the
//! drain deadline is exceeded.

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webhook_receiver::lifecycle::{self, listen_for_signals};
use webhook_receiver::{router, AppState, Config};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        signature_verification_enabled = config.signature_verification_enabled(),
        max_body_bytes = config.max_body_bytes,
        shutdown_timeout_secs = config.shutdown_timeout.as_secs(),
        "config_loaded"
    );

    if !config.signature_verification_enabled() {
        warn!("WEBHOOK_SECRET not set, webhook signature verification is disabled");
    }

    let app = router(AppState::new(config.clone()));

    let handle = lifecycle::start(&config, app)
        .await
        .context("Failed to start server")?;

    let _signals = listen_for_signals(handle.shutdown_trigger());

    info!(address = %handle.local_addr(), "web_server_listening");

    let outcome = handle.wait().await;

    info!(
        outcome = ?outcome,
        exit_code = outcome.exit_code(),
        "web_server_shutdown_complete"
    );

    std::process::exit(outcome.exit_code());
}
