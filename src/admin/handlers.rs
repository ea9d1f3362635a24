use anyhow::anyhow;
use axum::{
    extract::{rejection::PathRejection, Path, State},
    response::{Html, Response},
    routing::get,
    Router,
};
use time::{Duration, OffsetDateTime};
use tower_sessions::Session;
use tracing::{info, instrument};

use crate::{
    auth::{
        extractors::AdminUser,
        session::{self, FlashLevel},
    },
    error::{redirect, AppError},
    state::AppState,
    views::{self, PendingPage},
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/pending", get(pending))
        .route("/admin/approve/:user_id", get(approve))
}

#[instrument(skip_all, fields(admin_id = admin.id))]
pub async fn pending(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    session: Session,
) -> Result<Html<String>, AppError> {
    let users = state.users.list_pending().await?;
    let flashes = session::take_flashes(&session).await?;
    views::render(PendingPage::new(&flashes, &users))
}

/// Activates a user for one subscription period starting now. Re-approving restarts the window.
#[instrument(skip_all, fields(admin_id = admin.id))]
pub async fn approve(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    session: Session,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError> {
    let Ok(Path(user_id)) = path else {
        return Err(AppError::NotFound("user"));
    };

    let start = OffsetDateTime::now_utc();
    let end = start
        .checked_add(Duration::days(state.config.subscription_days))
        .ok_or_else(|| anyhow!("subscription end for user {user_id} is out of range"))?;
    let user = state
        .users
        .activate(user_id, start, end)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    info!(user_id = user.id, email = %user.email, %end, "user approved");
    session::flash(
        &session,
        FlashLevel::Success,
        format!("User {} approved.", user.email),
    )
    .await?;
    Ok(redirect("/admin/pending"))
}

#[cfg(test)]
mod tests {
    use crate::{state::AppState, test_support::TestClient};
    use axum::http::StatusCode;
    use std::sync::Arc;
    use time::Duration;

    #[tokio::test]
    async fn pending_is_forbidden_for_regular_users() {
        let mut client = TestClient::new();
        client.seed_active_user("me@speedmail.com", "pw1").await;
        client.login("me@speedmail.com", "pw1").await;

        assert_eq!(client.get("/admin/pending").await.status, StatusCode::FORBIDDEN);
        assert_eq!(client.get("/admin/approve/1").await.status, StatusCode::FORBIDDEN);
        // still logged in afterwards
        assert_eq!(client.get("/dashboard").await.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn pending_requires_login() {
        let mut client = TestClient::new();
        assert_eq!(client.get("/admin/pending").await.location(), "/login");
        assert_eq!(client.get("/admin/approve/1").await.location(), "/login");
    }

    #[tokio::test]
    async fn pending_lists_exactly_inactive_users() {
        let mut client = TestClient::new();
        client.seed_user("wait1@speedmail.com", "pw1").await;
        client.seed_user("wait2@speedmail.com", "pw1").await;
        client.seed_active_user("live@speedmail.com", "pw1").await;
        client.seed_admin("root@speedmail.com", "root").await;
        client.login("root@speedmail.com", "root").await;

        let res = client.get("/admin/pending").await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("wait1@speedmail.com"));
        assert!(res.body.contains("wait2@speedmail.com"));
        assert!(!res.body.contains("live@speedmail.com"));
        assert!(!res.body.contains("root@speedmail.com"));
        assert_eq!(res.body.matches("/admin/approve/").count(), 2);
    }

    #[tokio::test]
    async fn approve_sets_a_thirty_day_window_and_is_repeatable() {
        let mut client = TestClient::new();
        let user = client.seed_user("wait@speedmail.com", "pw1").await;
        client.seed_admin("root@speedmail.com", "root").await;
        client.login("root@speedmail.com", "root").await;

        let path = format!("/admin/approve/{}", user.id);
        let res = client.get(&path).await;
        assert_eq!(res.location(), "/admin/pending");
        let page = client.get("/admin/pending").await;
        assert!(page.body.contains("User wait@speedmail.com approved."));
        assert!(!page.body.contains("/admin/approve/"));

        let first = client.state.users.find_by_id(user.id).await.unwrap().unwrap();
        assert!(first.is_active && first.payment_verified);
        let (start, end) = (first.subscription_start.unwrap(), first.subscription_end.unwrap());
        assert_eq!(end - start, Duration::days(30));

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(client.get(&path).await.location(), "/admin/pending");
        let second = client.state.users.find_by_id(user.id).await.unwrap().unwrap();
        assert!(second.is_active && second.payment_verified);
        assert!(second.subscription_start.unwrap() > start);
        assert!(second.subscription_end.unwrap() > end);
        assert_eq!(
            second.subscription_end.unwrap() - second.subscription_start.unwrap(),
            Duration::days(30)
        );
    }

    #[tokio::test]
    async fn approve_unknown_user_is_not_found() {
        let mut client = TestClient::new();
        client.seed_admin("root@speedmail.com", "root").await;
        client.login("root@speedmail.com", "root").await;
        assert_eq!(client.get("/admin/approve/404").await.status, StatusCode::NOT_FOUND);
        assert_eq!(client.get("/admin/approve/nope").await.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bootstrap_replaces_a_squatted_admin_password() {
        let mut squatter = TestClient::new();
        squatter.register("root@speedmail.com", "evil").await;
        squatter.seed_admin("root@speedmail.com", "operator-secret").await;

        let res = squatter.login("root@speedmail.com", "evil").await;
        assert_eq!(res.location(), "/login");
        assert!(squatter.get("/login").await.body.contains("Invalid credentials"));
        assert_eq!(squatter.get("/admin/pending").await.location(), "/login");

        let mut operator = squatter.new_browser();
        let res = operator.login("root@speedmail.com", "operator-secret").await;
        assert_eq!(res.location(), "/dashboard");
        assert_eq!(operator.get("/admin/pending").await.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn approve_with_out_of_range_period_is_a_server_error() {
        let mut state = AppState::fake();
        let mut config = (*state.config).clone();
        config.subscription_days = 10_000_000;
        state.config = Arc::new(config);
        let mut client = TestClient::with_state(state);
        let user = client.seed_user("wait@speedmail.com", "pw1").await;
        client.seed_admin("root@speedmail.com", "root").await;
        client.login("root@speedmail.com", "root").await;

        let res = client.get(&format!("/admin/approve/{}", user.id)).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        let stored = client.state.users.find_by_id(user.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
    }

    #[tokio::test]
    async fn full_registration_and_approval_flow() {
        let mut user = TestClient::new();
        assert_eq!(user.register("new@speedmail.com", "pw1").await.location(), "/login");
        assert_eq!(user.login("new@speedmail.com", "pw1").await.location(), "/login");
        assert_eq!(user.get("/dashboard").await.location(), "/login");

        let mut admin = user.new_browser();
        admin.seed_admin("root@speedmail.com", "root").await;
        admin.login("root@speedmail.com", "root").await;
        let pending = admin.get("/admin/pending").await;
        assert!(pending.body.contains("new@speedmail.com"));
        let id = user
            .state
            .users
            .find_by_email("new@speedmail.com")
            .await
            .unwrap()
            .unwrap()
            .id;
        admin.get(&format!("/admin/approve/{id}")).await;

        assert_eq!(user.login("new@speedmail.com", "pw1").await.location(), "/dashboard");
        let dash = user.get("/dashboard").await;
        assert_eq!(dash.status, StatusCode::OK);
        assert!(dash.body.contains("new@speedmail.com"));

        assert_eq!(user.get("/logout").await.location(), "/login");
        assert_eq!(user.get("/dashboard").await.location(), "/login");
    }
}
