use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oddball::{config::AppConfig, questions::QuestionBank, state::AppState, sweeper, ws};

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
                .unwrap_or_else(|_| "oddball=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Oddball...");

    let config = AppConfig::from_env();

    let questions = match &config.questions_path {
        Some(path) => QuestionBank::from_path(path),
        None => QuestionBank::builtin(),
    }
    .and_then(|bank| bank.ensure_tiers(config.game.tiers).map(|_| bank));
    let questions = match questions {
        Ok(bank) => bank,
        Err(e) => {
            tracing::error!("Question bank unusable: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState::new(config.game.clone(), questions));

    // Spawn background task that drops abandoned sessions
    sweeper::spawn_session_sweeper(state.clone());

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
