use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::{info, warn};

use super::{
    repo::UserRepo,
    repo_types::{SubscriptionStatus, User},
    session::{self, FlashLevel},
};
use crate::{error::AppError, state::AppState};

/// Resolves the session's user, if any.
pub async fn current_user(session: &Session, users: &dyn UserRepo) -> Result<Option<User>, AppError> {
    let Some(user_id) = session::session_user_id(session).await? else {
        return Ok(None);
    };
    Ok(users.find_by_id(user_id).await?)
}

/// Whether `user` may hold an authenticated session at `now`.
pub fn require_active_subscription(user: &User, now: OffsetDateTime) -> bool {
    user.subscription_status(now) == SubscriptionStatus::Active
}

/// Guard run before every protected page. A session whose user no longer
/// passes [`require_active_subscription`] is logged out on the spot.
pub async fn require_active_user(session: &Session, users: &dyn UserRepo) -> Result<User, AppError> {
    let Some(user) = current_user(session, users).await? else {
        session::log_out(session).await?;
        return Err(AppError::Unauthenticated);
    };

    let now = OffsetDateTime::now_utc();
    if !require_active_subscription(&user, now) {
        let status = user.subscription_status(now);
        info!(user_id = user.id, ?status, "session user no longer active; logging out");
        session::log_out(session).await?;
        session::flash(session, FlashLevel::Danger, status_message(status)).await?;
        return Err(AppError::Unauthenticated);
    }

    Ok(user)
}

pub async fn require_admin(session: &Session, users: &dyn UserRepo) -> Result<User, AppError> {
    let user = require_active_user(session, users).await?;
    if !user.is_admin {
        warn!(user_id = user.id, "non-admin attempted admin access");
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

pub(crate) fn status_message(status: SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Active => "",
        SubscriptionStatus::Inactive => {
            "Account is not active yet. Complete payment and wait for admin approval."
        }
        SubscriptionStatus::Expired => "Your subscription has expired. Please renew to continue.",
    }
}

async fn session_from_parts(parts: &mut Parts, state: &AppState) -> Result<Session, AppError> {
    Session::from_request_parts(parts, state)
        .await
        .map_err(|(_, msg)| AppError::Internal(anyhow::anyhow!(msg)))
}

/// A logged-in user whose subscription is currently valid.
pub struct ActiveUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for ActiveUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts, state).await?;
        require_active_user(&session, state.users.as_ref())
            .await
            .map(ActiveUser)
    }
}

/// An [`ActiveUser`] with the admin role.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts, state).await?;
        require_admin(&session, state.users.as_ref())
            .await
            .map(AdminUser)
    }
}
