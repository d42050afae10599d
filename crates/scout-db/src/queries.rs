use crate::Database;
use crate::models::{ChallengeRow, EmailLogRow, MessageRow, StartupRow};
use anyhow::Result;
use rusqlite::Connection;
use scout_types::models::{Challenge, InteractionMessage, StartupList, StartupRecord};

/// Write-side shape for one email audit row. The `events` map starts empty
/// and is only ever touched by the delivery reconciler.
pub struct NewEmailLog {
    pub id: String,
    pub user_id: String,
    pub message_id: String,
    pub recipient_email: String,
    pub subject: String,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub sent_at: String,
}

impl Database {
    // -- Startups --

    pub fn insert_startup(&self, record: &StartupRecord) -> Result<()> {
        let founders = serde_json::to_string(&record.founders)?;
        let profile = serde_json::to_string(&record.profile)?;
        let field_edited_at = serde_json::to_string(&record.field_edited_at)?;

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO selected_startups (
                    id, user_id, challenge_id, challenge_title, name, stage,
                    email, phone, website, linkedin, description, auto_messaging,
                    founders, profile, field_edited_at, selected_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                rusqlite::params![
                    record.id.to_string(),
                    record.user_id.to_string(),
                    record.challenge_id.map(|id| id.to_string()),
                    record.challenge_title,
                    record.name,
                    record.stage.as_str(),
                    record.email,
                    record.phone,
                    record.website,
                    record.linkedin,
                    record.description,
                    record.auto_messaging,
                    founders,
                    profile,
                    field_edited_at,
                    record.selected_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_startup(&self, id: &str) -> Result<Option<StartupRow>> {
        self.with_conn(|conn| query_startup(conn, id))
    }

    pub fn list_startups(&self, user_id: &str) -> Result<Vec<StartupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STARTUP_COLUMNS} FROM selected_startups WHERE user_id = ?1"
            ))?;
            let rows = stmt
                .query_map([user_id], map_startup_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Last-write-wins update of a single column. `column` must come from
    /// the handler's whitelist — it is interpolated into the statement.
    pub fn update_startup_column(
        &self,
        id: &str,
        column: &str,
        value: rusqlite::types::Value,
        field_edited_at: &str,
        updated_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "UPDATE selected_startups
                     SET {column} = ?1, field_edited_at = ?2, updated_at = ?3
                     WHERE id = ?4"
                ),
                rusqlite::params![value, field_edited_at, updated_at, id],
            )?;
            Ok(())
        })
    }

    pub fn set_startup_stage(&self, id: &str, stage: &str, updated_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE selected_startups SET stage = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![stage, updated_at, id],
            )?;
            Ok(())
        })
    }

    pub fn set_startup_founders(
        &self,
        id: &str,
        founders_json: &str,
        updated_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE selected_startups SET founders = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![founders_json, updated_at, id],
            )?;
            Ok(())
        })
    }

    /// Removes the record and its embedded founders. CRM messages are left
    /// in place — the interaction history outlives the pipeline entry.
    pub fn delete_startup(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM selected_startups WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- CRM messages --

    pub fn insert_message(&self, msg: &InteractionMessage) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO crm_messages (
                    id, startup_id, user_id, channel, content, sent_at,
                    recipient_name, recipient_role, recipient_email, recipient_phone,
                    subject, status, provider_message_id, last_event, last_event_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                rusqlite::params![
                    msg.id.to_string(),
                    msg.startup_id.to_string(),
                    msg.user_id.to_string(),
                    msg.channel.as_str(),
                    msg.content,
                    msg.sent_at.to_rfc3339(),
                    msg.recipient_name,
                    msg.recipient_role.as_str(),
                    msg.recipient_email,
                    msg.recipient_phone,
                    msg.subject,
                    msg.status.as_str(),
                    msg.provider_message_id,
                    msg.last_event,
                    msg.last_event_at.map(|at| at.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch by startup only, unordered. Owner filtering and the
    /// newest-first sort are the caller's job — the store is not asked for
    /// a compound index it does not have.
    pub fn messages_for_startup(&self, startup_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM crm_messages WHERE startup_id = ?1"
            ))?;
            let rows = stmt
                .query_map([startup_id], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Reconciler write: every message carrying the correlation id is
    /// updated identically (fan-out, not first-match). Returns the number
    /// of rows touched.
    pub fn update_message_status_by_provider_id(
        &self,
        provider_id: &str,
        status: &str,
        event_type: &str,
        at: &str,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE crm_messages
                 SET status = ?1, last_event = ?2, last_event_at = ?3
                 WHERE provider_message_id = ?4",
                rusqlite::params![status, event_type, at, provider_id],
            )?;
            Ok(changed)
        })
    }

    // -- Email logs --

    pub fn insert_email_log(&self, log: &NewEmailLog) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO email_logs (
                    id, user_id, message_id, recipient_email, subject,
                    status, provider_message_id, error, events, sent_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, '{}', ?9)",
                rusqlite::params![
                    log.id,
                    log.user_id,
                    log.message_id,
                    log.recipient_email,
                    log.subject,
                    log.status,
                    log.provider_message_id,
                    log.error,
                    log.sent_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn email_logs_by_provider_id(&self, provider_id: &str) -> Result<Vec<EmailLogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, events FROM email_logs WHERE provider_message_id = ?1")?;
            let rows = stmt
                .query_map([provider_id], |row| {
                    Ok(EmailLogRow {
                        id: row.get(0)?,
                        events: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Append `{timestamp, data}` under `events[event_type]` on every audit
    /// row matching the correlation id. Returns the number of rows touched.
    pub fn append_email_event(
        &self,
        provider_id: &str,
        event_type: &str,
        data: &serde_json::Value,
        at: &str,
    ) -> Result<usize> {
        let logs = self.email_logs_by_provider_id(provider_id)?;
        let touched = logs.len();

        for log in logs {
            let mut events: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&log.events).unwrap_or_default();
            events.insert(
                event_type.to_string(),
                serde_json::json!({ "timestamp": at, "data": data }),
            );
            let serialized = serde_json::to_string(&events)?;

            self.with_conn_mut(|conn| {
                conn.execute(
                    "UPDATE email_logs SET events = ?1 WHERE id = ?2",
                    rusqlite::params![serialized, log.id],
                )?;
                Ok(())
            })?;
        }

        Ok(touched)
    }

    // -- Challenges --

    pub fn insert_challenge(&self, challenge: &Challenge) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO challenges (id, user_id, title, description, session_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    challenge.id.to_string(),
                    challenge.user_id.to_string(),
                    challenge.title,
                    challenge.description,
                    challenge.session_id,
                    challenge.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_challenge(&self, id: &str) -> Result<Option<ChallengeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, description, session_id, created_at
                 FROM challenges WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_challenge_row).optional()?;
            Ok(row)
        })
    }

    pub fn list_challenges(&self, user_id: &str) -> Result<Vec<ChallengeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, description, session_id, created_at
                 FROM challenges WHERE user_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_challenge_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_challenge(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE challenges
                 SET title = COALESCE(?1, title), description = COALESCE(?2, description)
                 WHERE id = ?3",
                rusqlite::params![title, description, id],
            )?;
            Ok(())
        })
    }

    // -- Startup lists --

    pub fn insert_startup_list(&self, list: &StartupList) -> Result<()> {
        let data = serde_json::to_string(&list.data)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO startup_lists (id, user_id, challenge_id, challenge_title, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    list.id.to_string(),
                    list.user_id.to_string(),
                    list.challenge_id.map(|id| id.to_string()),
                    list.challenge_title,
                    data,
                    list.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }
}

const STARTUP_COLUMNS: &str = "id, user_id, challenge_id, challenge_title, name, stage, \
     email, phone, website, linkedin, description, auto_messaging, \
     founders, profile, field_edited_at, selected_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, startup_id, user_id, channel, content, sent_at, \
     recipient_name, recipient_role, recipient_email, recipient_phone, \
     subject, status, provider_message_id, last_event, last_event_at";

fn query_startup(conn: &Connection, id: &str) -> Result<Option<StartupRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STARTUP_COLUMNS} FROM selected_startups WHERE id = ?1"
    ))?;
    let row = stmt.query_row([id], map_startup_row).optional()?;
    Ok(row)
}

fn map_startup_row(row: &rusqlite::Row<'_>) -> std::result::Result<StartupRow, rusqlite::Error> {
    Ok(StartupRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        challenge_id: row.get(2)?,
        challenge_title: row.get(3)?,
        name: row.get(4)?,
        stage: row.get(5)?,
        email: row.get(6)?,
        phone: row.get(7)?,
        website: row.get(8)?,
        linkedin: row.get(9)?,
        description: row.get(10)?,
        auto_messaging: row.get(11)?,
        founders: row.get(12)?,
        profile: row.get(13)?,
        field_edited_at: row.get(14)?,
        selected_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn map_message_row(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        startup_id: row.get(1)?,
        user_id: row.get(2)?,
        channel: row.get(3)?,
        content: row.get(4)?,
        sent_at: row.get(5)?,
        recipient_name: row.get(6)?,
        recipient_role: row.get(7)?,
        recipient_email: row.get(8)?,
        recipient_phone: row.get(9)?,
        subject: row.get(10)?,
        status: row.get(11)?,
        provider_message_id: row.get(12)?,
        last_event: row.get(13)?,
        last_event_at: row.get(14)?,
    })
}

fn map_challenge_row(row: &rusqlite::Row<'_>) -> std::result::Result<ChallengeRow, rusqlite::Error> {
    Ok(ChallengeRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        session_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scout_types::models::{
        Channel, Founder, MessageStatus, RecipientRole, Stage, StartupRecord,
    };
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn sample_record(user_id: Uuid) -> StartupRecord {
        StartupRecord {
            id: Uuid::new_v4(),
            user_id,
            challenge_id: None,
            challenge_title: Some("Logística verde".into()),
            name: "Acme Robotics".into(),
            stage: Stage::Mapeada,
            email: "hello@acme.example".into(),
            phone: "+55 11 99999-8888".into(),
            website: "https://acme.example".into(),
            linkedin: String::new(),
            description: "Warehouse robots".into(),
            auto_messaging: false,
            founders: vec![Founder {
                name: "Carla".into(),
                ..Founder::blank()
            }],
            profile: serde_json::json!({ "rating": 5, "city": "São Paulo" }),
            field_edited_at: BTreeMap::new(),
            selected_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_message(startup_id: Uuid, user_id: Uuid, provider_id: Option<&str>) -> InteractionMessage {
        InteractionMessage {
            id: Uuid::new_v4(),
            startup_id,
            user_id,
            channel: Channel::Email,
            content: "Olá, tudo bem?".into(),
            sent_at: Utc::now(),
            recipient_name: "Carla".into(),
            recipient_role: RecipientRole::Founder,
            recipient_email: Some("carla@acme.example".into()),
            recipient_phone: None,
            subject: Some("Convite".into()),
            status: MessageStatus::Sent,
            provider_message_id: provider_id.map(str::to_string),
            last_event: None,
            last_event_at: None,
        }
    }

    #[test]
    fn startup_round_trips_through_storage() {
        let db = Database::open_in_memory().unwrap();
        let record = sample_record(Uuid::new_v4());
        db.insert_startup(&record).unwrap();

        let loaded = db
            .get_startup(&record.id.to_string())
            .unwrap()
            .unwrap()
            .into_record()
            .unwrap();

        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.stage, Stage::Mapeada);
        assert_eq!(loaded.founders.len(), 1);
        assert_eq!(loaded.founders[0].name, "Carla");
        assert_eq!(loaded.profile["city"], "São Paulo");
    }

    #[test]
    fn deleting_a_startup_keeps_its_messages() {
        let db = Database::open_in_memory().unwrap();
        let user_id = Uuid::new_v4();
        let record = sample_record(user_id);
        db.insert_startup(&record).unwrap();
        db.insert_message(&sample_message(record.id, user_id, None)).unwrap();

        db.delete_startup(&record.id.to_string()).unwrap();

        assert!(db.get_startup(&record.id.to_string()).unwrap().is_none());
        let messages = db.messages_for_startup(&record.id.to_string()).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn provider_update_fans_out_to_every_match() {
        let db = Database::open_in_memory().unwrap();
        let user_id = Uuid::new_v4();
        let startup_id = Uuid::new_v4();
        db.insert_message(&sample_message(startup_id, user_id, Some("ms_1"))).unwrap();
        db.insert_message(&sample_message(startup_id, user_id, Some("ms_1"))).unwrap();
        db.insert_message(&sample_message(startup_id, user_id, Some("ms_2"))).unwrap();

        let touched = db
            .update_message_status_by_provider_id("ms_1", "delivered", "delivered", &Utc::now().to_rfc3339())
            .unwrap();
        assert_eq!(touched, 2);

        let delivered = db
            .messages_for_startup(&startup_id.to_string())
            .unwrap()
            .into_iter()
            .filter(|m| m.status == "delivered")
            .count();
        assert_eq!(delivered, 2);
    }

    #[test]
    fn email_events_accumulate_per_type() {
        let db = Database::open_in_memory().unwrap();
        let log = NewEmailLog {
            id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            message_id: Uuid::new_v4().to_string(),
            recipient_email: "carla@acme.example".into(),
            subject: "Convite".into(),
            status: "sent".into(),
            provider_message_id: Some("ms_9".into()),
            error: None,
            sent_at: Utc::now().to_rfc3339(),
        };
        db.insert_email_log(&log).unwrap();

        let at = Utc::now().to_rfc3339();
        db.append_email_event("ms_9", "opened", &serde_json::json!({"ip": "10.0.0.1"}), &at)
            .unwrap();
        db.append_email_event("ms_9", "delivered", &serde_json::json!({}), &at).unwrap();

        let rows = db.email_logs_by_provider_id("ms_9").unwrap();
        let events: serde_json::Value = serde_json::from_str(&rows[0].events).unwrap();
        assert!(events.get("opened").is_some());
        assert!(events.get("delivered").is_some());

        // Unknown id touches nothing
        let touched = db
            .append_email_event("ms_missing", "delivered", &serde_json::json!({}), &at)
            .unwrap();
        assert_eq!(touched, 0);
    }
}
