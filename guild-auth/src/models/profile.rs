//! Self-introduction profile, maintained by the profile sync job and read here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub discord_message_id: String,
    pub real_name: Option<String>,
    pub student_id: Option<String>,
    pub hobbies: Option<String>,
    pub what_to_do: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
