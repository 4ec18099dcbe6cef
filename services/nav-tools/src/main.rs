//! qmag-nav tool-call server.
//!
//! Exposes the four magnetic-domain operations an AI-assistant tool
//! caller needs: field lookup, scalar-observation position
//! estimation, sensor calibration, and deterministic trajectory
//! simulation. The position-pseudo-observation HTTP surface lives in
//! the sibling `nav-api` binary.

use std::sync::Arc;

use axum::{extract::Extension, routing::get, routing::post, Router};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use nav_tools::config::AppConfig;
use nav_tools::handlers;
use nav_tools::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "nav-tools")]
#[command(about = "Tool-call surface for the qmag-nav navigation service")]
struct Args {
    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

async fn metrics_handler(
    Extension(handle): Extension<metrics_exporter_prometheus::PrometheusHandle>,
) -> impl axum::response::IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
}

async fn healthz() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
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

    info!("starting qmag-nav tool-call server");

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
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route(
            "/tools/query_magnetic_field",
            post(handlers::query_magnetic_field::query_magnetic_field),
        )
        .route(
            "/tools/estimate_position",
            post(handlers::estimate_position::estimate_position),
        )
        .route(
            "/tools/calibrate_sensor",
            post(handlers::calibrate_sensor::calibrate_sensor),
        )
        .route(
            "/tools/simulate_trajectory",
            post(handlers::simulate_trajectory::simulate_trajectory),
        )
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
