use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline stages, in funnel order. Stage labels are the Portuguese terms
/// the pipeline was designed around and are part of the stored contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Mapeada,
    Selecionada,
    Contatada,
    Entrevistada,
    Poc,
}

impl Stage {
    pub const ORDERED: [Stage; 5] = [
        Stage::Mapeada,
        Stage::Selecionada,
        Stage::Contatada,
        Stage::Entrevistada,
        Stage::Poc,
    ];

    /// Next stage in the funnel. Clamped at the terminal stage — advancing
    /// past `poc` is a no-op, never an error.
    pub fn advance(self) -> Stage {
        let idx = Self::ORDERED.iter().position(|s| *s == self).unwrap_or(0);
        Self::ORDERED[(idx + 1).min(Self::ORDERED.len() - 1)]
    }

    /// Previous stage in the funnel, clamped at `mapeada`.
    pub fn retreat(self) -> Stage {
        let idx = Self::ORDERED.iter().position(|s| *s == self).unwrap_or(0);
        Self::ORDERED[idx.saturating_sub(1)]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Mapeada => "mapeada",
            Stage::Selecionada => "selecionada",
            Stage::Contatada => "contatada",
            Stage::Entrevistada => "entrevistada",
            Stage::Poc => "poc",
        }
    }

    pub fn parse(s: &str) -> Option<Stage> {
        Self::ORDERED.iter().copied().find(|stage| stage.as_str() == s)
    }
}

/// Outbound channel a CRM message was composed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Whatsapp,
    /// Composed by the assistant and stored without a transport attempt.
    Ai,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Whatsapp => "whatsapp",
            Channel::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Option<Channel> {
        match s {
            "email" => Some(Channel::Email),
            "whatsapp" => Some(Channel::Whatsapp),
            "ai" => Some(Channel::Ai),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Failed,
    Delivered,
    Generated,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Generated => "generated",
        }
    }

    pub fn parse(s: &str) -> Option<MessageStatus> {
        match s {
            "sent" => Some(MessageStatus::Sent),
            "failed" => Some(MessageStatus::Failed),
            "delivered" => Some(MessageStatus::Delivered),
            "generated" => Some(MessageStatus::Generated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientRole {
    Startup,
    Founder,
}

impl RecipientRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientRole::Startup => "startup",
            RecipientRole::Founder => "founder",
        }
    }

    pub fn parse(s: &str) -> Option<RecipientRole> {
        match s {
            "startup" => Some(RecipientRole::Startup),
            "founder" => Some(RecipientRole::Founder),
            _ => None,
        }
    }
}

/// A contact person embedded in a startup record. Founders have no
/// independent lifecycle — they live and die with their record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Founder {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub whatsapp: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub role: String,
}

impl Founder {
    pub fn blank() -> Founder {
        Founder {
            id: Uuid::new_v4(),
            name: String::new(),
            email: String::new(),
            whatsapp: String::new(),
            linkedin: String::new(),
            role: String::new(),
        }
    }
}

/// A blank founder may only be appended once the previous one has a name.
/// Keeps the roster from accumulating empty entries.
pub fn can_add_founder(founders: &[Founder]) -> bool {
    founders.last().is_none_or(|f| !f.name.trim().is_empty())
}

/// One startup inside one user's pipeline.
///
/// Contact fields are stored exactly once, here. The card-shaped snapshot
/// some consumers expect (`startup_data`) is computed at read time — see
/// [`StartupRecord::startup_data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub challenge_id: Option<Uuid>,
    pub challenge_title: Option<String>,
    pub name: String,
    pub stage: Stage,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub auto_messaging: bool,
    #[serde(default)]
    pub founders: Vec<Founder>,
    /// Discovery card data as delivered by the chat webhook (rating,
    /// category, city, team size, ...). The shape is owned by the webhook.
    #[serde(default)]
    pub profile: serde_json::Value,
    /// Per-field edit timestamps for the independently editable contact
    /// fields.
    #[serde(default)]
    pub field_edited_at: BTreeMap<String, DateTime<Utc>>,
    pub selected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StartupRecord {
    pub fn can_add_founder(&self) -> bool {
        can_add_founder(&self.founders)
    }

    /// Read-time projection of the nested card snapshot. Overlays the
    /// canonical contact fields onto the stored profile so the two can
    /// never diverge.
    pub fn startup_data(&self) -> serde_json::Value {
        let mut data = match &self.profile {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        data.insert("name".into(), serde_json::Value::String(self.name.clone()));
        data.insert("email".into(), serde_json::Value::String(self.email.clone()));
        data.insert("website".into(), serde_json::Value::String(self.website.clone()));
        data.insert(
            "description".into(),
            serde_json::Value::String(self.description.clone()),
        );
        let social = data
            .entry("socialLinks")
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if let serde_json::Value::Object(social) = social {
            social.insert(
                "linkedin".into(),
                serde_json::Value::String(self.linkedin.clone()),
            );
        }
        serde_json::Value::Object(data)
    }
}

/// `updated_at` must move forward on every mutation, even when the wall
/// clock has not (sub-millisecond edits, clock skew after restore).
pub fn next_updated_at(prev: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > prev { now } else { prev + Duration::milliseconds(1) }
}

/// One logged outbound communication attempt. Append-only: after creation
/// only `status`, `last_event` and `last_event_at` change, and only via the
/// delivery reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionMessage {
    pub id: Uuid,
    pub startup_id: Uuid,
    pub user_id: Uuid,
    pub channel: Channel,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub recipient_name: String,
    pub recipient_role: RecipientRole,
    pub recipient_email: Option<String>,
    pub recipient_phone: Option<String>,
    pub subject: Option<String>,
    pub status: MessageStatus,
    pub provider_message_id: Option<String>,
    pub last_event: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
}

/// A discovery conversation anchor. The chat webhook correlates turns by
/// `session_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

/// A shortlist extracted from one chat webhook reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupList {
    pub id: Uuid,
    pub user_id: Uuid,
    pub challenge_id: Option<Uuid>,
    pub challenge_title: Option<String>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
