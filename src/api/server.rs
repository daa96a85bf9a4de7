use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    alert_status, current_metrics, health_check, metrics_chart, metrics_history, thresholds,
    AppState,
};
use crate::alerts::{Notifier, ThresholdEvaluator, ThresholdFile};
use crate::collector::{Collector, CollectorHandle};
use crate::query::QueryService;
use crate::sampler::{Sampler, SystemSampler};
use crate::storage::{MetricStore, StoreError};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Append-only row log backing the metric store
    pub data_file: PathBuf,
    /// JSON threshold file, re-read on every evaluation
    pub thresholds_file: PathBuf,
    pub collect_interval_secs: u64,
    /// How long shutdown waits for an in-flight collection cycle
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            data_file: PathBuf::from("./system_metrics.jsonl"),
            thresholds_file: PathBuf::from("./config/thresholds.json"),
            collect_interval_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the environment
    /// HOSTPULSE_HOST=0.0.0.0
    /// HOSTPULSE_PORT=3000
    /// HOSTPULSE_DATA_FILE=./system_metrics.jsonl
    /// HOSTPULSE_THRESHOLDS_FILE=./config/thresholds.json
    /// HOSTPULSE_COLLECT_INTERVAL_SECS=30
    /// HOSTPULSE_SHUTDOWN_GRACE_SECS=5
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: lookup("HOSTPULSE_HOST").unwrap_or(defaults.host),
            port: lookup("HOSTPULSE_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            data_file: lookup("HOSTPULSE_DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
            thresholds_file: lookup("HOSTPULSE_THRESHOLDS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.thresholds_file),
            collect_interval_secs: parsed("HOSTPULSE_COLLECT_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.collect_interval_secs),
            shutdown_grace_secs: parsed("HOSTPULSE_SHUTDOWN_GRACE_SECS")
                .unwrap_or(defaults.shutdown_grace_secs),
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/metrics/current", get(current_metrics))
        .route("/metrics/history", get(metrics_history))
        .route("/metrics", get(metrics_chart))
        .route("/thresholds", get(thresholds))
        .route("/alerts/status", get(alert_status));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server and the collector until a shutdown signal arrives.
///
/// Shutdown order: stop serving, stop the collector, wipe the store, close
/// the store.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MetricStore::open(&config.data_file)?);
    let sampler: Arc<dyn Sampler> = Arc::new(SystemSampler::new());

    let notifier = Notifier::from_env();
    tracing::info!("Alert targets: {}", notifier.targets().len());

    let evaluator = Arc::new(ThresholdEvaluator::new(
        Arc::new(ThresholdFile::new(&config.thresholds_file)),
        Arc::new(notifier),
    ));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    // Start background collection once the port is ours
    let collector = Arc::new(Collector::new(
        Arc::clone(&sampler),
        Arc::clone(&store),
        Arc::clone(&evaluator),
    ));
    let collector_handle = collector.start(Duration::from_secs(config.collect_interval_secs));

    let state = Arc::new(AppState {
        query: Arc::new(QueryService::new(sampler, Arc::clone(&store))),
        evaluator,
    });
    let app = build_router(state);

    tracing::info!("Server is running on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    tracing::info!("Server closed, stopping collector...");
    shutdown_pipeline(
        collector_handle,
        &store,
        Duration::from_secs(config.shutdown_grace_secs),
    )
    .await?;
    served?;

    tracing::info!("Cleanup complete");
    Ok(())
}

/// Stop the collector, then wipe and close the store.
///
/// The collector is fully stopped (or abandoned after `grace`) before the
/// wipe, so no cycle can write into a store that is being emptied.
pub async fn shutdown_pipeline(
    collector: CollectorHandle,
    store: &MetricStore,
    grace: Duration,
) -> Result<(), StoreError> {
    collector.shutdown(grace).await;

    match store.wipe() {
        Ok(removed) => tracing::info!("Wiped {} metric rows", removed),
        Err(e) => tracing::error!(error = %e, "Error wiping all metrics"),
    }
    store.close()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Received shutdown signal, closing server...");
}
