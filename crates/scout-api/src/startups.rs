use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

use scout_types::api::{
    Claims, ListStartupsQuery, RemoveFounderQuery, SaveStartupRequest, StageOp, StageRequest,
    StageResponse, StartupDetailResponse, UpdateFieldRequest, UpdateFounderRequest,
};
use scout_types::models::{Founder, Stage, StartupRecord, next_updated_at};

use crate::messages::load_user_messages;
use crate::state::{AppState, db_error, join_error};

/// Contact fields that may be written through the single-field endpoint.
const TEXT_FIELDS: &[&str] = &["name", "email", "phone", "website", "linkedin", "description"];

/// Promote a discovered startup into the caller's pipeline. Every record
/// enters at the first stage.
pub async fn save_startup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SaveStartupRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let now = Utc::now();
    let record = StartupRecord {
        id: Uuid::new_v4(),
        user_id: claims.sub,
        challenge_id: req.challenge_id,
        challenge_title: req.challenge_title,
        name: req.name,
        stage: Stage::Mapeada,
        email: req.email,
        phone: req.phone,
        website: req.website,
        linkedin: req.linkedin,
        description: req.description,
        auto_messaging: false,
        founders: vec![],
        profile: req.profile,
        field_edited_at: Default::default(),
        selected_at: now,
        updated_at: now,
    };

    let db = state.clone();
    let to_insert = record.clone();
    tokio::task::spawn_blocking(move || db.db.insert_startup(&to_insert))
        .await
        .map_err(join_error)?
        .map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_startups(
    State(state): State<AppState>,
    Query(query): Query<ListStartupsQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let uid = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.list_startups(&uid))
        .await
        .map_err(join_error)?
        .map_err(db_error)?;

    let mut records: Vec<StartupRecord> = rows
        .into_iter()
        .filter_map(|row| match row.into_record() {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping corrupt startup row: {:#}", e);
                None
            }
        })
        .filter(|record| query.stage.is_none_or(|stage| record.stage == stage))
        .collect();

    records.sort_by(|a, b| b.selected_at.cmp(&a.selected_at));

    Ok(Json(records))
}

pub async fn get_startup(
    State(state): State<AppState>,
    Path(startup_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let record = load_owned(&state, startup_id, claims.sub).await?;
    let messages = load_user_messages(&state, startup_id, claims.sub).await?;

    Ok(Json(StartupDetailResponse {
        startup_data: record.startup_data(),
        startup: record,
        messages,
    }))
}

/// Remove a pipeline entry. Founders are embedded and go with it; the
/// interaction history stays behind on purpose.
pub async fn delete_startup(
    State(state): State<AppState>,
    Path(startup_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    load_owned(&state, startup_id, claims.sub).await?;

    let db = state.clone();
    let sid = startup_id.to_string();
    tokio::task::spawn_blocking(move || db.db.delete_startup(&sid))
        .await
        .map_err(join_error)?
        .map_err(db_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Last-write-wins write of a single contact field (or the auto-messaging
/// toggle). Each field persists independently; there is no record-level
/// version token.
pub async fn update_field(
    State(state): State<AppState>,
    Path(startup_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateFieldRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let mut record = load_owned(&state, startup_id, claims.sub).await?;

    let value = if TEXT_FIELDS.contains(&req.field.as_str()) {
        let text = req.value.as_str().ok_or(StatusCode::BAD_REQUEST)?;
        scout_db::rusqlite::types::Value::Text(text.to_string())
    } else if req.field == "auto_messaging" {
        let flag = req.value.as_bool().ok_or(StatusCode::BAD_REQUEST)?;
        scout_db::rusqlite::types::Value::Integer(flag as i64)
    } else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let updated_at = next_updated_at(record.updated_at);
    record.field_edited_at.insert(req.field.clone(), updated_at);
    let edited_map = serde_json::to_string(&record.field_edited_at).map_err(|e| {
        error!("field_edited_at serialization failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let db = state.clone();
    let sid = startup_id.to_string();
    let field = req.field;
    let stamp = updated_at.to_rfc3339();
    tokio::task::spawn_blocking(move || {
        db.db.update_startup_column(&sid, &field, value, &edited_map, &stamp)
    })
    .await
    .map_err(join_error)?
    .map_err(db_error)?;

    Ok(Json(serde_json::json!({ "updated_at": updated_at })))
}

/// Advance or retreat the pipeline stage. The transition is computed from
/// the stored stage and clamped at the funnel ends; persistence is
/// fire-and-forget and the next full reload is authoritative.
pub async fn set_stage(
    State(state): State<AppState>,
    Path(startup_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let record = load_owned(&state, startup_id, claims.sub).await?;

    let next = match req.op {
        StageOp::Advance => record.stage.advance(),
        StageOp::Retreat => record.stage.retreat(),
    };

    let updated_at = next_updated_at(record.updated_at).to_rfc3339();
    let db = state.clone();
    let sid = startup_id.to_string();
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || {
            db.db.set_startup_stage(&sid, next.as_str(), &updated_at)
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("stage write failed for {}: {:#}", startup_id, e),
            Err(e) => error!("stage write task failed for {}: {}", startup_id, e),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(StageResponse { stage: next })))
}

/// Append a blank founder slot. Refused while the previous slot is still
/// unnamed.
pub async fn add_founder(
    State(state): State<AppState>,
    Path(startup_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let mut record = load_owned(&state, startup_id, claims.sub).await?;

    if !record.can_add_founder() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let founder = Founder::blank();
    record.founders.push(founder.clone());
    persist_founders(&state, startup_id, &record).await?;

    Ok((StatusCode::CREATED, Json(founder)))
}

const FOUNDER_FIELDS: &[&str] = &["name", "email", "whatsapp", "linkedin", "role"];

pub async fn update_founder(
    State(state): State<AppState>,
    Path((startup_id, founder_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateFounderRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if !FOUNDER_FIELDS.contains(&req.field.as_str()) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut record = load_owned(&state, startup_id, claims.sub).await?;
    let founder = record
        .founders
        .iter_mut()
        .find(|f| f.id == founder_id)
        .ok_or(StatusCode::NOT_FOUND)?;

    match req.field.as_str() {
        "name" => founder.name = req.value,
        "email" => founder.email = req.value,
        "whatsapp" => founder.whatsapp = req.value,
        "linkedin" => founder.linkedin = req.value,
        "role" => founder.role = req.value,
        _ => unreachable!(),
    }
    let updated = founder.clone();

    persist_founders(&state, startup_id, &record).await?;

    Ok(Json(updated))
}

/// Removing a named founder is destructive and must be confirmed by the
/// caller; unnamed slots are discarded freely.
pub async fn remove_founder(
    State(state): State<AppState>,
    Path((startup_id, founder_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<RemoveFounderQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let mut record = load_owned(&state, startup_id, claims.sub).await?;

    let idx = record
        .founders
        .iter()
        .position(|f| f.id == founder_id)
        .ok_or(StatusCode::NOT_FOUND)?;

    if !record.founders[idx].name.trim().is_empty() && !query.confirm {
        return Err(StatusCode::CONFLICT);
    }

    record.founders.remove(idx);
    persist_founders(&state, startup_id, &record).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn persist_founders(
    state: &AppState,
    startup_id: Uuid,
    record: &StartupRecord,
) -> Result<(), StatusCode> {
    let founders_json = serde_json::to_string(&record.founders).map_err(|e| {
        error!("founders serialization failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let updated_at = next_updated_at(record.updated_at).to_rfc3339();

    let db = state.clone();
    let sid = startup_id.to_string();
    tokio::task::spawn_blocking(move || db.db.set_startup_founders(&sid, &founders_json, &updated_at))
        .await
        .map_err(join_error)?
        .map_err(db_error)?;

    Ok(())
}

/// Fetch a record and check it belongs to the caller. Records owned by
/// another user are indistinguishable from missing ones.
pub(crate) async fn load_owned(
    state: &AppState,
    startup_id: Uuid,
    user_id: Uuid,
) -> Result<StartupRecord, StatusCode> {
    let db = state.clone();
    let sid = startup_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_startup(&sid))
        .await
        .map_err(join_error)?
        .map_err(db_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let record = row.into_record().map_err(|e| {
        error!("corrupt startup row {}: {:#}", startup_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if record.user_id != user_id {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(record)
}
