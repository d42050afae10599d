use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    middleware,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use scout_api::challenges;
use scout_api::chat::{self, ChatClient};
use scout_api::messages;
use scout_api::middleware::require_auth;
use scout_api::startups;
use scout_api::state::{AppState, AppStateInner};
use scout_api::webhooks;
use scout_channels::email::{self, EmailConfig, EmailTransport};
use scout_channels::whatsapp::WhatsAppTransport;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scout=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = env_or("SCOUT_HOST", "0.0.0.0");
    let port: u16 = env_or("SCOUT_PORT", "3000").parse()?;
    let db_path = env_or("SCOUT_DB_PATH", "scout.db");

    let email_transport = EmailTransport::new(EmailConfig {
        api_url: env_or("MAILERSEND_API_URL", email::DEFAULT_API_URL),
        api_key: env_or("MAILERSEND_API_KEY", ""),
        from_email: env_or("MAIL_FROM_EMAIL", "noreply@genoi.net"),
        from_name: env_or("MAIL_FROM_NAME", "Gen.OI - Inovação Aberta"),
        reply_to_email: env_or("MAIL_REPLY_TO_EMAIL", "contact@genoi.net"),
        reply_to_name: env_or("MAIL_REPLY_TO_NAME", "Gen.OI - Suporte"),
        sender_name: env_or("MAIL_SENDER_NAME", "Agente de Inovação Aberta - Genie"),
    })?;

    let whatsapp_transport = WhatsAppTransport::new(
        env_or("WHATSAPP_API_URL", "http://localhost:8080"),
        env_or("WHATSAPP_INSTANCE", "scout"),
        env_or("WHATSAPP_API_KEY", ""),
    )?;

    let chat_client = ChatClient::new(env_or(
        "CHAT_WEBHOOK_URL",
        "http://localhost:5678/webhook/production",
    ))?;

    // Init database
    let db = scout_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        email: email_transport,
        whatsapp: whatsapp_transport,
        chat: chat_client,
    });

    // Routes
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat::chat))
        .route("/webhooks/email", post(webhooks::email_events))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/startups", get(startups::list_startups))
        .route("/startups", post(startups::save_startup))
        .route("/startups/{startup_id}", get(startups::get_startup))
        .route("/startups/{startup_id}", delete(startups::delete_startup))
        .route("/startups/{startup_id}/fields", patch(startups::update_field))
        .route("/startups/{startup_id}/stage", post(startups::set_stage))
        .route("/startups/{startup_id}/founders", post(startups::add_founder))
        .route(
            "/startups/{startup_id}/founders/{founder_id}",
            patch(startups::update_founder),
        )
        .route(
            "/startups/{startup_id}/founders/{founder_id}",
            delete(startups::remove_founder),
        )
        .route("/startups/{startup_id}/messages", get(messages::get_messages))
        .route("/startups/{startup_id}/messages", post(messages::send_message))
        .route("/challenges", get(challenges::list_challenges))
        .route("/challenges", post(challenges::create_challenge))
        .route("/challenges/{challenge_id}", patch(challenges::update_challenge))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Scout server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
