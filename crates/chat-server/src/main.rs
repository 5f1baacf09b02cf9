//! chat-orchestrator HTTP Server
//!
//! Axum-based transport shell around the conversation orchestration engine.
//! Exposes the chat endpoint plus a health check; everything stateful lives
//! behind the engine.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_core::{
    session::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL_SECS},
    CompletionProvider, GenerationOptions, MemorySessionStore, Orchestrator, OrchestratorConfig,
    ToolRegistry,
};
use chat_runtime::{OpenAiCompatProvider, WebSearchTool};

use crate::handlers::{chat_handler, health_check};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Initialize completion provider
    let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAiCompatProvider::from_env()?);

    match provider.health_check().await {
        Ok(true) => tracing::info!("✓ Completion service reachable"),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Completion service not reachable - chat requests will fail");
            tracing::warn!("  Check GROQ_API_KEY and GROQ_BASE_URL");
        }
    }

    // Initialize tools
    let mut tools = ToolRegistry::new();
    let mut search_enabled = false;

    match WebSearchTool::from_env() {
        Ok(tool) => {
            tools.register(tool);
            search_enabled = true;
        }
        Err(e) => {
            tracing::warn!("⚠ Web search disabled: {}", e);
            tracing::warn!("  Set TAVILY_API_KEY in .env to enable it");
        }
    }

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    // Session store
    let ttl_secs = env_parsed("SESSION_TTL_SECS", DEFAULT_TTL_SECS);
    let max_entries = env_parsed("SESSION_MAX_ENTRIES", DEFAULT_MAX_ENTRIES);
    let sessions = Arc::new(MemorySessionStore::new(
        chrono::Duration::seconds(ttl_secs),
        max_entries,
    ));

    // Orchestration engine
    let generation = GenerationOptions {
        model: std::env::var("GROQ_MODEL")
            .unwrap_or_else(|_| GenerationOptions::default().model),
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(
        provider.clone(),
        Arc::new(tools),
        sessions,
        OrchestratorConfig {
            generation,
            ..Default::default()
        },
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        provider,
        search_enabled,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 chat server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health - Health check");
    tracing::info!("  POST /chat   - Send message");

    axum::serve(listener, app).await?;

    Ok(())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
