//! Collaborative coding interview server.
//!
//! Run with: cargo run -p codepair-server -- --bind 127.0.0.1:8000
//!
//! Then `POST /sessions` and connect participants to `/ws/{session_id}`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{Json, Router, routing::get};
use clap::Parser;
use codepair_session::{DEFAULT_OUTBOUND_CAPACITY, SessionHub, storage::MemoryStore};
use codepair_transport::{TransportConfig, config::DEFAULT_MAX_MESSAGE_BYTES, router};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Server configuration. Every flag can also be set from the environment.
#[derive(Debug, Parser)]
#[command(name = "codepair-server", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "CODEPAIR_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Frames queued per connection before it is dropped as too slow.
    /// Values below 2 are raised to 2.
    #[arg(long, env = "CODEPAIR_OUTBOUND_CAPACITY", default_value_t = DEFAULT_OUTBOUND_CAPACITY)]
    outbound_capacity: usize,

    /// Largest inbound WebSocket message, in bytes.
    #[arg(long, env = "CODEPAIR_MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    max_message_bytes: usize,
}

impl Args {
    const fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            max_message_bytes: self.max_message_bytes,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = args.transport_config();

    let hub = Arc::new(SessionHub::with_outbound_capacity(
        MemoryStore::new(),
        args.outbound_capacity,
    ));

    // Build router
    let app = Router::new()
        .route("/", get(index_handler))
        .merge(router(hub, config))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!("Server listening on http://{}", args.bind);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn index_handler() -> Json<Value> {
    Json(json!({ "message": "Collaborative Coding Interview Platform API" }))
}
