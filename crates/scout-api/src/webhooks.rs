use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::{debug, error};

use scout_db::Database;
use scout_types::events::ProviderEvent;

use crate::state::AppState;

/// Inbound email-provider webhook. The provider posts a JSON array of
/// events and retries on non-2xx, so processing is best-effort: individual
/// events that fail to parse, match nothing, or hit a storage error are
/// logged and skipped, and the batch still gets a 200. Only a body that is
/// not an array is a client error.
pub async fn email_events(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, StatusCode> {
    let Some(events) = body.as_array() else {
        return Err(StatusCode::BAD_REQUEST);
    };

    for raw in events {
        let event: ProviderEvent = match serde_json::from_value(raw.clone()) {
            Ok(event) => event,
            Err(e) => {
                debug!("Skipping unparseable provider event: {}", e);
                continue;
            }
        };

        let db = state.clone();
        match tokio::task::spawn_blocking(move || apply_provider_event(&db.db, &event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("provider event processing failed: {:#}", e),
            Err(e) => error!("provider event task failed: {}", e),
        }
    }

    Ok("OK")
}

/// Apply one asynchronous delivery event.
///
/// The raw event is appended to the audit trail of every email log sharing
/// the correlation id, and terminal signals (`delivered`, `bounced`)
/// overwrite the status of every matching CRM message — fan-out, not
/// first-match. An id that matches nothing is not an error: the provider
/// also reports on messages this deployment never tracked.
pub fn apply_provider_event(db: &Database, event: &ProviderEvent) -> anyhow::Result<()> {
    let Some(provider_id) = event.message_id() else {
        debug!("Provider event '{}' carries no message id", event.event_type);
        return Ok(());
    };

    let at = Utc::now().to_rfc3339();

    let audited = db.append_email_event(provider_id, &event.event_type, &event.data, &at)?;

    if let Some(status) = event.terminal_status() {
        let updated = db.update_message_status_by_provider_id(
            provider_id,
            status.as_str(),
            &event.event_type,
            &at,
        )?;
        if audited == 0 && updated == 0 {
            debug!("Provider event for unknown id {} dropped", provider_id);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scout_types::models::{Channel, InteractionMessage, MessageStatus, RecipientRole};
    use uuid::Uuid;

    fn stored_message(db: &Database, provider_id: &str) -> InteractionMessage {
        let message = InteractionMessage {
            id: Uuid::new_v4(),
            startup_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            channel: Channel::Email,
            content: "Olá, podemos agendar uma conversa?".into(),
            sent_at: Utc::now(),
            recipient_name: "Carla".into(),
            recipient_role: RecipientRole::Founder,
            recipient_email: Some("carla@acme.example".into()),
            recipient_phone: None,
            subject: Some("Convite".into()),
            status: MessageStatus::Sent,
            provider_message_id: Some(provider_id.into()),
            last_event: None,
            last_event_at: None,
        };
        db.insert_message(&message).unwrap();
        message
    }

    fn reload(db: &Database, message: &InteractionMessage) -> InteractionMessage {
        db.messages_for_startup(&message.startup_id.to_string())
            .unwrap()
            .into_iter()
            .find(|row| row.id == message.id.to_string())
            .unwrap()
            .into_message()
            .unwrap()
    }

    fn delivered_event(provider_id: &str) -> ProviderEvent {
        serde_json::from_value(serde_json::json!({
            "type": "delivered",
            "data": { "email": { "message": { "id": provider_id } } }
        }))
        .unwrap()
    }

    #[test]
    fn delivered_event_updates_only_the_status() {
        let db = Database::open_in_memory().unwrap();
        let before = stored_message(&db, "ms_42");

        apply_provider_event(&db, &delivered_event("ms_42")).unwrap();

        let after = reload(&db, &before);
        assert_eq!(after.status, MessageStatus::Delivered);
        assert_eq!(after.last_event.as_deref(), Some("delivered"));
        // Everything the sender wrote is untouched.
        assert_eq!(after.content, before.content);
        assert_eq!(after.channel, before.channel);
        assert_eq!(after.recipient_name, before.recipient_name);
        assert_eq!(after.subject, before.subject);
        assert_eq!(after.sent_at, before.sent_at);
    }

    #[test]
    fn bounced_event_marks_the_message_failed() {
        let db = Database::open_in_memory().unwrap();
        let message = stored_message(&db, "ms_43");

        let event: ProviderEvent = serde_json::from_value(serde_json::json!({
            "type": "bounced",
            "data": { "email": { "message": { "id": "ms_43" } } }
        }))
        .unwrap();
        apply_provider_event(&db, &event).unwrap();

        assert_eq!(reload(&db, &message).status, MessageStatus::Failed);
    }

    #[test]
    fn unknown_correlation_id_is_a_no_op() {
        let db = Database::open_in_memory().unwrap();
        let message = stored_message(&db, "ms_44");

        apply_provider_event(&db, &delivered_event("ms_nobody")).unwrap();

        let untouched = reload(&db, &message);
        assert_eq!(untouched.status, MessageStatus::Sent);
        assert!(untouched.last_event.is_none());
    }

    #[test]
    fn event_without_id_is_dropped() {
        let db = Database::open_in_memory().unwrap();
        let event = ProviderEvent {
            event_type: "delivered".into(),
            data: serde_json::json!({ "unexpected": "shape" }),
        };
        apply_provider_event(&db, &event).unwrap();
    }

    #[test]
    fn non_terminal_event_is_audit_only() {
        let db = Database::open_in_memory().unwrap();
        let message = stored_message(&db, "ms_45");

        let event: ProviderEvent = serde_json::from_value(serde_json::json!({
            "type": "opened",
            "data": { "email": { "message": { "id": "ms_45" } } }
        }))
        .unwrap();
        apply_provider_event(&db, &event).unwrap();

        assert_eq!(reload(&db, &message).status, MessageStatus::Sent);
    }
}
