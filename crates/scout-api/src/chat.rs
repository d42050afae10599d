use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

use scout_types::api::{ChatRequest, ChatResponse};
use scout_types::events::{ChatWebhookRequest, ChatWebhookReply, extract_startup_cards};
use scout_types::models::{Challenge, StartupList};

use crate::middleware::MaybeClaims;
use crate::state::{AppState, db_error, join_error};

/// The discovery webhook runs a language model behind it; give it more
/// room than the messaging transports before declaring it gone.
const CHAT_TIMEOUT: Duration = Duration::from_secs(120);

/// Thin client for the external discovery webhook. One POST per turn, no
/// streaming; the reply is the first element of the returned array.
pub struct ChatClient {
    client: reqwest::Client,
    webhook_url: String,
}

impl ChatClient {
    pub fn new(webhook_url: impl Into<String>) -> reqwest::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(CHAT_TIMEOUT).build()?,
            webhook_url: webhook_url.into(),
        })
    }

    pub async fn ask(&self, request: &ChatWebhookRequest) -> anyhow::Result<String> {
        let replies: Vec<ChatWebhookReply> = self
            .client
            .post(&self.webhook_url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(replies.into_iter().next().map(|r| r.output).unwrap_or_default())
    }
}

/// One chat turn. Anonymous callers get the assistant reply only; for
/// authenticated callers a `<startup cards>` block in the reply is parsed
/// and persisted as a shortlist.
pub async fn chat(
    State(state): State<AppState>,
    MaybeClaims(claims): MaybeClaims,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.message.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let challenge = match (&claims, req.challenge_id) {
        (Some(claims), Some(challenge_id)) => {
            Some(load_owned_challenge(&state, challenge_id, claims.sub).await?)
        }
        _ => None,
    };

    let webhook_request = ChatWebhookRequest {
        message: req.message.clone(),
        session_id: challenge
            .as_ref()
            .map(|c| c.session_id.clone())
            .unwrap_or_else(|| "anonymous".into()),
        is_anonymous: claims.is_none(),
    };

    let reply = state.chat.ask(&webhook_request).await.map_err(|e| {
        warn!("chat webhook failed: {:#}", e);
        StatusCode::BAD_GATEWAY
    })?;

    let mut startup_list_id = None;
    if let (Some(claims), Some(cards)) = (&claims, extract_startup_cards(&reply)) {
        let list = StartupList {
            id: Uuid::new_v4(),
            user_id: claims.sub,
            challenge_id: challenge.as_ref().map(|c| c.id),
            challenge_title: challenge.as_ref().map(|c| c.title.clone()),
            data: cards,
            created_at: Utc::now(),
        };

        let db = state.clone();
        let record = list.clone();
        match tokio::task::spawn_blocking(move || db.db.insert_startup_list(&record)).await {
            Ok(Ok(())) => startup_list_id = Some(list.id),
            Ok(Err(e)) => error!("startup list insert failed: {:#}", e),
            Err(e) => error!("startup list task failed: {}", e),
        }
    }

    Ok(Json(ChatResponse {
        reply,
        startup_list_id,
    }))
}

async fn load_owned_challenge(
    state: &AppState,
    challenge_id: Uuid,
    user_id: Uuid,
) -> Result<Challenge, StatusCode> {
    let db = state.clone();
    let cid = challenge_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_challenge(&cid))
        .await
        .map_err(join_error)?
        .map_err(db_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let challenge = row.into_challenge().map_err(|e| {
        error!("corrupt challenge row {}: {:#}", challenge_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if challenge.user_id != user_id {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(challenge)
}
