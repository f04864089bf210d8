mod api;
mod errors;
mod models;
mod reconcile;
mod repl;
mod service;
mod session;

use std::time::Duration;

use tracing::info;

use crate::api::HistoryClient;
use crate::service::chat_service::ChatService;
use crate::session::FileSessionCache;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolshub_chat=debug".into()),
        )
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let base_url = std::env::var("TOOLSHUB_API_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());
    let token = std::env::var("TOOLSHUB_API_TOKEN")
        .expect("TOOLSHUB_API_TOKEN must be set (copy .env.example to .env)");
    let session_file = std::env::var("TOOLSHUB_SESSION_FILE")
        .unwrap_or_else(|_| ".toolshub_session.json".to_string());

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()?;
    let client = HistoryClient::new(http, base_url.as_str(), token);
    let session = FileSessionCache::new(&session_file);
    let mut chat_service = ChatService::new(client, session);

    info!("Loading chat history from {base_url}");
    chat_service.load().await?;

    repl::run(&mut chat_service).await
}
