use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

use scout_channels::{DeliveryOutcome, phone};
use scout_db::queries::NewEmailLog;
use scout_types::api::{Claims, RecipientRef, SendMessageRequest};
use scout_types::models::{
    Channel, InteractionMessage, MessageStatus, RecipientRole, StartupRecord,
};

use crate::startups::load_owned;
use crate::state::{AppState, db_error, join_error};

pub async fn get_messages(
    State(state): State<AppState>,
    Path(startup_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    load_owned(&state, startup_id, claims.sub).await?;
    let messages = load_user_messages(&state, startup_id, claims.sub).await?;
    Ok(Json(messages))
}

/// Compose one outbound message and attempt delivery once.
///
/// Validation failures reject the request before anything is stored or
/// sent. A transport failure is not an error: the message is persisted
/// with `status = failed` and returned like any other.
pub async fn send_message(
    State(state): State<AppState>,
    Path(startup_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let record = load_owned(&state, startup_id, claims.sub).await?;
    let recipient = resolve_recipient(&record, &req.recipient)?;

    let subject = req.subject.as_deref().map(str::trim).unwrap_or_default();
    match req.channel {
        Channel::Email => {
            if !plausible_email(&recipient.email) || subject.is_empty() {
                return Err(StatusCode::BAD_REQUEST);
            }
        }
        Channel::Whatsapp => {
            if phone::normalize(&recipient.phone).is_empty() {
                return Err(StatusCode::BAD_REQUEST);
            }
        }
        Channel::Ai => {}
    }

    let outcome = match req.channel {
        Channel::Email => {
            Some(state.email.send(&recipient.email, &recipient.name, subject, &content).await)
        }
        Channel::Whatsapp => Some(state.whatsapp.send(&recipient.phone, &content).await),
        Channel::Ai => None,
    };

    let status = match &outcome {
        None => MessageStatus::Generated,
        Some(DeliveryOutcome { success: true, .. }) => MessageStatus::Sent,
        Some(DeliveryOutcome { success: false, .. }) => MessageStatus::Failed,
    };

    let message = InteractionMessage {
        id: Uuid::new_v4(),
        startup_id,
        user_id: claims.sub,
        channel: req.channel,
        content,
        sent_at: Utc::now(),
        recipient_name: recipient.name,
        recipient_role: recipient.role,
        recipient_email: (req.channel == Channel::Email).then(|| recipient.email.clone()),
        recipient_phone: (req.channel == Channel::Whatsapp)
            .then(|| phone::normalize(&recipient.phone)),
        subject: (req.channel == Channel::Email).then(|| subject.to_string()),
        status,
        provider_message_id: outcome.as_ref().and_then(|o| o.provider_message_id.clone()),
        last_event: None,
        last_event_at: None,
    };

    let db = state.clone();
    let to_insert = message.clone();
    tokio::task::spawn_blocking(move || db.db.insert_message(&to_insert))
        .await
        .map_err(join_error)?
        .map_err(db_error)?;

    // Email sends get an audit row alongside the message; losing it is
    // logged but does not fail the request.
    if req.channel == Channel::Email {
        let log = NewEmailLog {
            id: Uuid::new_v4().to_string(),
            user_id: claims.sub.to_string(),
            message_id: message.id.to_string(),
            recipient_email: message.recipient_email.clone().unwrap_or_default(),
            subject: subject.to_string(),
            status: message.status.as_str().to_string(),
            provider_message_id: message.provider_message_id.clone(),
            error: outcome.as_ref().and_then(|o| o.error.clone()),
            sent_at: message.sent_at.to_rfc3339(),
        };
        let db = state.clone();
        match tokio::task::spawn_blocking(move || db.db.insert_email_log(&log)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("email log insert failed: {:#}", e),
            Err(e) => error!("email log task failed: {}", e),
        }
    }

    Ok((StatusCode::CREATED, Json(message)))
}

struct ResolvedRecipient {
    name: String,
    role: RecipientRole,
    email: String,
    phone: String,
}

fn resolve_recipient(
    record: &StartupRecord,
    recipient: &RecipientRef,
) -> Result<ResolvedRecipient, StatusCode> {
    match recipient {
        RecipientRef::Startup => Ok(ResolvedRecipient {
            name: record.name.clone(),
            role: RecipientRole::Startup,
            email: record.email.clone(),
            phone: record.phone.clone(),
        }),
        RecipientRef::Founder { founder_id } => {
            let founder = record
                .founders
                .iter()
                .find(|f| f.id == *founder_id)
                .ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;
            Ok(ResolvedRecipient {
                name: founder.name.clone(),
                role: RecipientRole::Founder,
                email: founder.email.clone(),
                phone: founder.whatsapp.clone(),
            })
        }
    }
}

fn plausible_email(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty() && !host.is_empty() && !tld.is_empty() && !domain.contains('@')
}

/// The store is queried by startup only; scoping to the owner and the
/// newest-first order are applied here.
pub(crate) async fn load_user_messages(
    state: &AppState,
    startup_id: Uuid,
    user_id: Uuid,
) -> Result<Vec<InteractionMessage>, StatusCode> {
    let db = state.clone();
    let sid = startup_id.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.messages_for_startup(&sid))
        .await
        .map_err(join_error)?
        .map_err(db_error)?;

    let mut messages: Vec<InteractionMessage> = rows
        .into_iter()
        .filter_map(|row| match row.into_message() {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping corrupt message row: {:#}", e);
                None
            }
        })
        .filter(|message| message.user_id == user_id)
        .collect();

    messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::plausible_email;

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(plausible_email("carla@acme.example"));
        assert!(plausible_email("a.b+c@sub.domain.co"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!plausible_email(""));
        assert!(!plausible_email("carla"));
        assert!(!plausible_email("carla@acme"));
        assert!(!plausible_email("carla@.com"));
        assert!(!plausible_email("@acme.example"));
        assert!(!plausible_email("carla @acme.example"));
        assert!(!plausible_email("carla@acme."));
    }
}
