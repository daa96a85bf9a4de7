//! Hostpulse Server
//!
//! Run with: cargo run
//!
//! Environment variables (a `.env` file in the working directory is loaded first):
//! - HOSTPULSE_HOST: Bind address (default: 0.0.0.0)
//! - HOSTPULSE_PORT: Port number (default: 3000)
//! - HOSTPULSE_DATA_FILE: Metric row log (default: ./system_metrics.jsonl)
//! - HOSTPULSE_THRESHOLDS_FILE: Threshold config (default: ./config/thresholds.json)
//! - HOSTPULSE_COLLECT_INTERVAL_SECS: Sampling period (default: 30)
//! - HOSTPULSE_SHUTDOWN_GRACE_SECS: Wait for an in-flight cycle on shutdown (default: 5)
//! - RUST_LOG: Log level (default: info)
//!
//! Alert delivery:
//! - SMTP_HOST, SMTP_PORT, SMTP_SECURE, SMTP_USER, SMTP_PASS, SMTP_FROM, ALERT_TO
//! - ALERT_WEBHOOK_URL

use hostpulse::api::{run_server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Missing .env is fine
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hostpulse=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    tracing::info!("Hostpulse configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Data file: {}", config.data_file.display());
    tracing::info!("  Thresholds file: {}", config.thresholds_file.display());
    tracing::info!(
        "  Collect interval: {} seconds",
        config.collect_interval_secs
    );
    tracing::info!("  Shutdown grace: {} seconds", config.shutdown_grace_secs);

    println!(
        r#"
  _               _               _
 | |__   ___  ___| |_ _ __  _   _| |___  ___
 | '_ \ / _ \/ __| __| '_ \| | | | / __|/ _ \
 | | | | (_) \__ \ |_| |_) | |_| | \__ \  __/
 |_| |_|\___/|___/\__| .__/ \__,_|_|___/\___|
                     |_|

 Host Resource Monitor
 Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );

    run_server(config).await
}
