use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verseparty::config::SourcingConfig;
use verseparty::llm::{CardGenerator, LlmConfig};
use verseparty::resolver::CardResolver;
use verseparty::state::session::InMemorySessionStore;
use verseparty::state::AppState;
use verseparty::usage::InMemoryUsageStore;
use verseparty::words::InMemoryWordStore;
use verseparty::{api, watcher};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verseparty=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting verseparty...");

    // Generative provider is optional; without one, draws come from the
    // curated pool and the built-in decks.
    let llm_config = LlmConfig::from_env();
    let generator = CardGenerator::from_config(&llm_config);
    if generator.is_configured() {
        tracing::info!("generative card source configured");
    } else {
        tracing::warn!(
            "No generative provider configured (set OPENAI_API_KEY or OLLAMA_BASE_URL). \
             Cards will come from the word pool and built-in decks."
        );
    }

    let resolver = Arc::new(CardResolver::new(
        generator,
        Arc::new(InMemoryWordStore::new()),
        Arc::new(InMemoryUsageStore::new()),
    ));
    let state = AppState::new(
        resolver,
        Arc::new(InMemorySessionStore::new()),
        SourcingConfig::from_env(),
    );

    // Auto-scores timed rounds whose countdown ran out.
    watcher::spawn_round_deadline_watcher(state.clone());

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
