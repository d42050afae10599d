use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Channel, InteractionMessage, Stage, StartupRecord};

// -- JWT Claims --

/// Claims minted by the external identity provider and verified here with
/// the shared secret. `sub` is the partitioning key for every collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Startups --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveStartupRequest {
    pub name: String,
    pub challenge_id: Option<Uuid>,
    pub challenge_title: Option<String>,
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
    pub profile: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ListStartupsQuery {
    pub stage: Option<Stage>,
}

/// Single-field write. `value` is a string for the text fields and a bool
/// for `auto_messaging`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateFieldRequest {
    pub field: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOp {
    Advance,
    Retreat,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageRequest {
    pub op: StageOp,
}

#[derive(Debug, Serialize)]
pub struct StageResponse {
    pub stage: Stage,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateFounderRequest {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveFounderQuery {
    #[serde(default)]
    pub confirm: bool,
}

/// The pipeline view for one record: the record itself, the projected card
/// snapshot, and the caller's interaction log, newest first.
#[derive(Debug, Serialize)]
pub struct StartupDetailResponse {
    pub startup: StartupRecord,
    pub startup_data: serde_json::Value,
    pub messages: Vec<InteractionMessage>,
}

// -- Messages --

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase", deny_unknown_fields)]
pub enum RecipientRef {
    Startup,
    Founder { founder_id: Uuid },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub channel: Channel,
    pub recipient: RecipientRef,
    pub content: String,
    pub subject: Option<String>,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatRequest {
    pub message: String,
    pub challenge_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub startup_list_id: Option<Uuid>,
}

// -- Challenges --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChallengeRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateChallengeRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}
