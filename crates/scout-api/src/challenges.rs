use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use scout_types::api::{Claims, CreateChallengeRequest, UpdateChallengeRequest};
use scout_types::models::Challenge;

use crate::state::{AppState, db_error, join_error};

pub async fn create_challenge(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChallengeRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.title.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let challenge = Challenge {
        id: Uuid::new_v4(),
        user_id: claims.sub,
        title: req.title,
        description: req.description,
        // Fresh chat session per challenge; the webhook keys its
        // conversation memory on this.
        session_id: Uuid::new_v4().to_string(),
        created_at: Utc::now(),
    };

    let db = state.clone();
    let to_insert = challenge.clone();
    tokio::task::spawn_blocking(move || db.db.insert_challenge(&to_insert))
        .await
        .map_err(join_error)?
        .map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(challenge)))
}

pub async fn list_challenges(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let uid = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.list_challenges(&uid))
        .await
        .map_err(join_error)?
        .map_err(db_error)?;

    let challenges: Vec<Challenge> = rows
        .into_iter()
        .filter_map(|row| match row.into_challenge() {
            Ok(challenge) => Some(challenge),
            Err(e) => {
                warn!("Skipping corrupt challenge row: {:#}", e);
                None
            }
        })
        .collect();

    Ok(Json(challenges))
}

pub async fn update_challenge(
    State(state): State<AppState>,
    Path(challenge_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateChallengeRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let cid = challenge_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_challenge(&cid))
        .await
        .map_err(join_error)?
        .map_err(db_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    if row.user_id != claims.sub.to_string() {
        return Err(StatusCode::NOT_FOUND);
    }

    let db = state.clone();
    let cid = challenge_id.to_string();
    tokio::task::spawn_blocking(move || {
        db.db.update_challenge(&cid, req.title.as_deref(), req.description.as_deref())
    })
    .await
    .map_err(join_error)?
    .map_err(db_error)?;

    Ok(StatusCode::NO_CONTENT)
}
