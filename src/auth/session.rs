use serde::{Deserialize, Serialize};
use tower_sessions::{session, Session};

pub const USER_ID_KEY: &str = "user_id";
const FLASHES_KEY: &str = "_flashes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Danger,
}

/// One-shot notice shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

pub async fn session_user_id(session: &Session) -> Result<Option<i64>, session::Error> {
    session.get::<i64>(USER_ID_KEY).await
}

/// Binds the session to `user_id`, rotating the session id first.
pub async fn log_in(session: &Session, user_id: i64) -> Result<(), session::Error> {
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user_id).await
}

pub async fn log_out(session: &Session) -> Result<(), session::Error> {
    session.remove::<i64>(USER_ID_KEY).await?;
    Ok(())
}

pub async fn flash(
    session: &Session,
    level: FlashLevel,
    message: impl Into<String>,
) -> Result<(), session::Error> {
    let mut flashes = session
        .get::<Vec<Flash>>(FLASHES_KEY)
        .await?
        .unwrap_or_default();
    flashes.push(Flash {
        level,
        message: message.into(),
    });
    session.insert(FLASHES_KEY, flashes).await
}

/// Drains pending flashes.
pub async fn take_flashes(session: &Session) -> Result<Vec<Flash>, session::Error> {
    Ok(session
        .remove::<Vec<Flash>>(FLASHES_KEY)
        .await?
        .unwrap_or_default())
}
