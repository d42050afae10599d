//! Database row types — these map directly to SQLite rows. Embedded
//! structures (founders, profile, audit events) travel as JSON text and are
//! decoded here, keeping the query layer free of serde.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use scout_types::models::{
    Challenge, Channel, Founder, InteractionMessage, MessageStatus, RecipientRole, Stage,
    StartupRecord,
};

pub struct StartupRow {
    pub id: String,
    pub user_id: String,
    pub challenge_id: Option<String>,
    pub challenge_title: Option<String>,
    pub name: String,
    pub stage: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub linkedin: String,
    pub description: String,
    pub auto_messaging: bool,
    pub founders: String,
    pub profile: String,
    pub field_edited_at: String,
    pub selected_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub startup_id: String,
    pub user_id: String,
    pub channel: String,
    pub content: String,
    pub sent_at: String,
    pub recipient_name: String,
    pub recipient_role: String,
    pub recipient_email: Option<String>,
    pub recipient_phone: Option<String>,
    pub subject: Option<String>,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub last_event: Option<String>,
    pub last_event_at: Option<String>,
}

pub struct EmailLogRow {
    pub id: String,
    pub events: String,
}

pub struct ChallengeRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub session_id: String,
    pub created_at: String,
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid {} timestamp '{}'", column, raw))
}

impl StartupRow {
    pub fn into_record(self) -> Result<StartupRecord> {
        let founders: Vec<Founder> =
            serde_json::from_str(&self.founders).context("corrupt founders document")?;
        let profile: serde_json::Value =
            serde_json::from_str(&self.profile).context("corrupt profile document")?;
        let field_edited_at: BTreeMap<String, DateTime<Utc>> =
            serde_json::from_str(&self.field_edited_at).context("corrupt field_edited_at map")?;

        Ok(StartupRecord {
            id: self.id.parse().context("corrupt startup id")?,
            user_id: self.user_id.parse().context("corrupt user id")?,
            challenge_id: self
                .challenge_id
                .as_deref()
                .map(|id| id.parse().context("corrupt challenge id"))
                .transpose()?,
            challenge_title: self.challenge_title,
            name: self.name,
            stage: Stage::parse(&self.stage)
                .with_context(|| format!("unknown stage '{}'", self.stage))?,
            email: self.email,
            phone: self.phone,
            website: self.website,
            linkedin: self.linkedin,
            description: self.description,
            auto_messaging: self.auto_messaging,
            founders,
            profile,
            field_edited_at,
            selected_at: parse_timestamp(&self.selected_at, "selected_at")?,
            updated_at: parse_timestamp(&self.updated_at, "updated_at")?,
        })
    }
}

impl MessageRow {
    pub fn into_message(self) -> Result<InteractionMessage> {
        Ok(InteractionMessage {
            id: self.id.parse().context("corrupt message id")?,
            startup_id: self.startup_id.parse().context("corrupt startup id")?,
            user_id: self.user_id.parse().context("corrupt user id")?,
            channel: Channel::parse(&self.channel)
                .with_context(|| format!("unknown channel '{}'", self.channel))?,
            content: self.content,
            sent_at: parse_timestamp(&self.sent_at, "sent_at")?,
            recipient_name: self.recipient_name,
            recipient_role: RecipientRole::parse(&self.recipient_role)
                .with_context(|| format!("unknown recipient role '{}'", self.recipient_role))?,
            recipient_email: self.recipient_email,
            recipient_phone: self.recipient_phone,
            subject: self.subject,
            status: MessageStatus::parse(&self.status)
                .with_context(|| format!("unknown status '{}'", self.status))?,
            provider_message_id: self.provider_message_id,
            last_event: self.last_event,
            last_event_at: self
                .last_event_at
                .as_deref()
                .map(|at| parse_timestamp(at, "last_event_at"))
                .transpose()?,
        })
    }
}

impl ChallengeRow {
    pub fn into_challenge(self) -> Result<Challenge> {
        Ok(Challenge {
            id: self.id.parse().context("corrupt challenge id")?,
            user_id: self.user_id.parse().context("corrupt user id")?,
            title: self.title,
            description: self.description,
            session_id: self.session_id,
            created_at: parse_timestamp(&self.created_at, "created_at")?,
        })
    }
}
