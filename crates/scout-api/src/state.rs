use std::sync::Arc;

use axum::http::StatusCode;
use tracing::error;

use scout_channels::email::EmailTransport;
use scout_channels::whatsapp::WhatsAppTransport;
use scout_db::Database;

use crate::chat::ChatClient;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub email: EmailTransport,
    pub whatsapp: WhatsAppTransport,
    pub chat: ChatClient,
}

pub(crate) fn join_error(e: tokio::task::JoinError) -> StatusCode {
    error!("spawn_blocking join error: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

pub(crate) fn db_error(e: anyhow::Error) -> StatusCode {
    error!("database error: {:#}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}
