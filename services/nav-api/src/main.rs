//! qmag-nav HTTP API server.
//!
//! Exposes the navigation pipeline's thin public surface: liveness,
//! readiness, Prometheus metrics, and a position-pseudo-observation
//! `/estimate` endpoint. The magnetic-domain tool surface lives in
//! the sibling `nav-tools` binary.

use std::sync::Arc;

use axum::{extract::Extension, routing::get, routing::post, Router};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use nav_api::config::AppConfig;
use nav_api::handlers;
use nav_api::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "nav-api")]
#[command(about = "HTTP surface for the qmag-nav navigation service")]
struct Args {
    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("starting qmag-nav HTTP API");

    let config = AppConfig::from_env()?;
    let listen_addr = config.listen_addr;

    let state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize application state");
            std::process::exit(1);
        }
    };

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let app = Router::new()
        .route("/healthz", get(handlers::health::healthz))
        .route("/readyz", get(handlers::health::readyz))
        .route("/metrics", get(handlers::health::metrics))
        .route("/estimate", post(handlers::estimate::estimate))
        .layer(Extension(state))
        .layer(Extension(prometheus_handle))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    info!(address = %listen_addr, "listening");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
