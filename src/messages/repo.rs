use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::repo_types::{Message, NewMessage};
use crate::db::{is_foreign_key_violation, RepoError, RepoResult};

/// Message storage. Replies must reference an existing message; since a new
/// message always gets a fresh id, reply chains can only point backwards.
#[async_trait]
pub trait MessageRepo: Send + Sync {
    async fn create(&self, msg: NewMessage) -> RepoResult<Message>;
    async fn get(&self, id: i64) -> RepoResult<Option<Message>>;
    /// Direct replies to `parent_id`, oldest first.
    async fn replies(&self, parent_id: i64) -> RepoResult<Vec<Message>>;
}

#[derive(Clone)]
pub struct PgMessageRepo {
    db: PgPool,
}

impl PgMessageRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageRepo for PgMessageRepo {
    async fn create(&self, msg: NewMessage) -> RepoResult<Message> {
        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (sender, recipient, subject, body, thread_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, sender, recipient, subject, body, timestamp, thread_id
            "#,
        )
        .bind(&msg.sender)
        .bind(&msg.recipient)
        .bind(&msg.subject)
        .bind(&msg.body)
        .bind(msg.thread_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match msg.thread_id {
            Some(parent) if is_foreign_key_violation(&e) => RepoError::UnknownParent(parent),
            _ => RepoError::Database(e),
        })
    }

    async fn get(&self, id: i64) -> RepoResult<Option<Message>> {
        let msg = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender, recipient, subject, body, timestamp, thread_id
              FROM messages
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(msg)
    }

    async fn replies(&self, parent_id: i64) -> RepoResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender, recipient, subject, body, timestamp, thread_id
              FROM messages
             WHERE thread_id = $1
             ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

#[derive(Default)]
pub struct MemoryMessageRepo {
    messages: RwLock<Vec<Message>>,
}

impl MemoryMessageRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepo for MemoryMessageRepo {
    async fn create(&self, msg: NewMessage) -> RepoResult<Message> {
        let mut messages = self.messages.write().await;
        if let Some(parent) = msg.thread_id {
            if !messages.iter().any(|m| m.id == parent) {
                return Err(RepoError::UnknownParent(parent));
            }
        }
        let stored = Message {
            id: messages.last().map_or(1, |m| m.id + 1),
            sender: msg.sender,
            recipient: msg.recipient,
            subject: msg.subject,
            body: msg.body,
            timestamp: OffsetDateTime::now_utc(),
            thread_id: msg.thread_id,
        };
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: i64) -> RepoResult<Option<Message>> {
        Ok(self.messages.read().await.iter().find(|m| m.id == id).cloned())
    }

    async fn replies(&self, parent_id: i64) -> RepoResult<Vec<Message>> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.thread_id == Some(parent_id))
            .cloned()
            .collect())
    }
}
