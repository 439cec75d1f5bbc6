use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bookbot::config::AppConfig;
use bookbot::db;
use bookbot::handlers;
use bookbot::services::ai::groq::GroqProvider;
use bookbot::services::ai::ollama::OllamaProvider;
use bookbot::services::ai::TextOracle;
use bookbot::services::booking::BookingPolicy;
use bookbot::services::messaging::telegram::TelegramProvider;
use bookbot::services::session::InMemorySessions;
use bookbot::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    anyhow::ensure!(
        !config.telegram_bot_token.is_empty(),
        "TELEGRAM_BOT_TOKEN must be set"
    );

    let conn = db::init_db(&config.database_url)?;
    let policy = BookingPolicy::from_config(&config)?;

    let oracle: Box<dyn TextOracle> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(
                !config.groq_api_key.is_empty(),
                "GROQ_API_KEY must be set when LLM_PROVIDER=groq"
            );
            tracing::info!("using Groq provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
                config.oracle_timeout_secs,
            ))
        }
        _ => {
            tracing::info!("using Ollama provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
                config.oracle_timeout_secs,
            ))
        }
    };

    let messaging = TelegramProvider::new(config.telegram_bot_token.clone());

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        policy,
        oracle,
        messaging: Box::new(messaging),
        sessions: Box::new(InMemorySessions::new()),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/telegram", post(handlers::webhook::telegram_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
