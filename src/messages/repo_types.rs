use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Stored message. `thread_id` points at the message this one replies to.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub sender: String,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
    pub timestamp: OffsetDateTime,
    pub thread_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender: String,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
    pub thread_id: Option<i64>,
}
