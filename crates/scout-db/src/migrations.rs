use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS selected_startups (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL,
            challenge_id    TEXT,
            challenge_title TEXT,
            name            TEXT NOT NULL,
            stage           TEXT NOT NULL,
            email           TEXT NOT NULL DEFAULT '',
            phone           TEXT NOT NULL DEFAULT '',
            website         TEXT NOT NULL DEFAULT '',
            linkedin        TEXT NOT NULL DEFAULT '',
            description     TEXT NOT NULL DEFAULT '',
            auto_messaging  INTEGER NOT NULL DEFAULT 0,
            founders        TEXT NOT NULL DEFAULT '[]',
            profile         TEXT NOT NULL DEFAULT '{}',
            field_edited_at TEXT NOT NULL DEFAULT '{}',
            selected_at     TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_selected_startups_user
            ON selected_startups(user_id);

        CREATE TABLE IF NOT EXISTS crm_messages (
            id                  TEXT PRIMARY KEY,
            startup_id          TEXT NOT NULL,
            user_id             TEXT NOT NULL,
            channel             TEXT NOT NULL,
            content             TEXT NOT NULL,
            sent_at             TEXT NOT NULL,
            recipient_name      TEXT NOT NULL,
            recipient_role      TEXT NOT NULL,
            recipient_email     TEXT,
            recipient_phone     TEXT,
            subject             TEXT,
            status              TEXT NOT NULL,
            provider_message_id TEXT,
            last_event          TEXT,
            last_event_at       TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_crm_messages_startup
            ON crm_messages(startup_id);

        CREATE INDEX IF NOT EXISTS idx_crm_messages_provider
            ON crm_messages(provider_message_id);

        CREATE TABLE IF NOT EXISTS email_logs (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL,
            message_id          TEXT NOT NULL,
            recipient_email     TEXT NOT NULL,
            subject             TEXT NOT NULL,
            status              TEXT NOT NULL,
            provider_message_id TEXT,
            error               TEXT,
            events              TEXT NOT NULL DEFAULT '{}',
            sent_at             TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_email_logs_provider
            ON email_logs(provider_message_id);

        CREATE TABLE IF NOT EXISTS challenges (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            title       TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            session_id  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_challenges_user
            ON challenges(user_id);

        CREATE TABLE IF NOT EXISTS startup_lists (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL,
            challenge_id    TEXT,
            challenge_title TEXT,
            data            TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
