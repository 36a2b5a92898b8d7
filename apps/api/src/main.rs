mod chatbot;
mod config;
mod errors;
mod llm_client;
mod retrieval;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::chatbot::readiness::{LiveComponentFactory, ReadinessGate};
use crate::chatbot::Chatbot;
use crate::config::{Config, GOOGLE_API_KEY_VAR};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails only on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting careerbot API v{}", env!("CARGO_PKG_VERSION"));

    if config.google_api_key.is_none() {
        warn!("{GOOGLE_API_KEY_VAR} is not set; chat stays unavailable until it is configured");
    }

    // Chatbot components are built lazily on the first chat request
    let gate = ReadinessGate::new(LiveComponentFactory::new(config.clone()));
    let chatbot = Arc::new(Chatbot::new(gate, config.init_timeout));
    info!(
        index = %config.chroma_url,
        collection = %config.chroma_collection,
        top_k = config.retrieval_top_k,
        "Chatbot configured"
    );

    // Build app state
    let state = AppState { chatbot };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the portal frontend has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
