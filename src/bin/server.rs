//! gateway-accumulator HTTP server binary.
//!
//! Starts an axum HTTP server exposing only the ambient `/health` and
//! `/metrics` endpoints; chunk ingestion happens by embedding
//! [`gateway_accumulator::accumulator::StreamDispatcher`] directly, not
//! over this HTTP surface.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 8080)
//! - `ACCUMULATOR_CHUNK_POOL_PREWARM_SIZE` — per-kind pool prewarm size
//! - `ACCUMULATOR_STATE_TTL_SECS` — abandoned-stream reclamation horizon
//! - `ACCUMULATOR_SWEEP_INTERVAL_SECS` — TTL sweeper tick interval
//! - `RUST_LOG` — tracing filter (default: "info")

use std::sync::Arc;

use gateway_accumulator::accumulator::{AccumulatorConfig, StreamDispatcher, TtlSweeper};
use gateway_accumulator::server::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gateway_accumulator=debug".into()),
        )
        .init();

    let config = AccumulatorConfig::from_env();
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind_addr = format!("0.0.0.0:{}", port);

    let dispatcher = Arc::new(StreamDispatcher::new(&config, None));
    let sweeper = Arc::new(TtlSweeper::new(
        dispatcher.registry().clone(),
        dispatcher.pools().clone(),
        config.state_ttl,
        config.sweep_interval,
    ));

    let sweeper_handle = tokio::spawn(sweeper.clone().run());

    let state = AppState {
        dispatcher: dispatcher.clone(),
    };
    let app = app_router(state);

    tracing::info!("gateway-accumulator server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET /health  — liveness probe");
    tracing::info!("  GET /metrics — pool and registry snapshot");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = serve.await {
        tracing::error!(%err, "server exited with error");
    }

    sweeper.stop();
    dispatcher.shutdown().await;
    let _ = sweeper_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl_c handler");
    tracing::info!("shutdown signal received");
}
