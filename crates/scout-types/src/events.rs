use serde::{Deserialize, Serialize};

use crate::models::MessageStatus;

/// One asynchronous event from the email provider's webhook, shaped
/// `{ "type": ..., "data": { "email": { "message": { "id": ... } } } }`.
/// `data` is kept verbatim for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ProviderEvent {
    /// Correlation id assigned by the provider at send time, if the
    /// envelope carries one.
    pub fn message_id(&self) -> Option<&str> {
        self.data.get("email")?.get("message")?.get("id")?.as_str()
    }

    /// Terminal delivery/failure signals overwrite the message status.
    /// Everything else is audit-only.
    pub fn terminal_status(&self) -> Option<MessageStatus> {
        match self.event_type.as_str() {
            "delivered" => Some(MessageStatus::Delivered),
            "bounced" => Some(MessageStatus::Failed),
            _ => None,
        }
    }
}

// -- Chat webhook --

#[derive(Debug, Clone, Serialize)]
pub struct ChatWebhookRequest {
    pub message: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "isAnonymous")]
    pub is_anonymous: bool,
}

/// The webhook replies with an array of these; only the first is used.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatWebhookReply {
    #[serde(default)]
    pub output: String,
}

const CARDS_OPEN: &str = "<startup cards>";
const CARDS_CLOSE: &str = "</startup cards>";

/// Extract the shortlist payload from a chat reply: the text between the
/// literal `<startup cards>` markers, parsed as JSON. Returns `None` when
/// either marker is missing or the block is not valid JSON.
pub fn extract_startup_cards(content: &str) -> Option<serde_json::Value> {
    let start = content.find(CARDS_OPEN)?;
    let end = content.find(CARDS_CLOSE)?;
    let json_str = content.get(start + CARDS_OPEN.len()..end)?.trim();
    serde_json::from_str(json_str).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_cards_between_markers() {
        let reply = "Encontrei estas startups:\n<startup cards>\n{\"startups\": [{\"name\": \"Acme\"}]}\n</startup cards>\nQuer refinar a busca?";
        let cards = extract_startup_cards(reply).unwrap();
        assert_eq!(cards["startups"][0]["name"], "Acme");
    }

    #[test]
    fn missing_markers_yield_none() {
        assert!(extract_startup_cards("sem cards aqui").is_none());
        assert!(extract_startup_cards("<startup cards>{\"a\":1}").is_none());
    }

    #[test]
    fn malformed_json_yields_none() {
        let reply = "<startup cards>not json</startup cards>";
        assert!(extract_startup_cards(reply).is_none());
    }

    #[test]
    fn provider_event_exposes_correlation_id() {
        let event: ProviderEvent = serde_json::from_value(serde_json::json!({
            "type": "delivered",
            "data": { "email": { "message": { "id": "ms_abc123" } } }
        }))
        .unwrap();

        assert_eq!(event.message_id(), Some("ms_abc123"));
        assert_eq!(event.terminal_status(), Some(MessageStatus::Delivered));
    }

    #[test]
    fn non_terminal_event_has_no_status() {
        let event = ProviderEvent {
            event_type: "opened".into(),
            data: serde_json::Value::Null,
        };
        assert_eq!(event.message_id(), None);
        assert_eq!(event.terminal_status(), None);
    }
}
