use axum::{
    extract::{rejection::PathRejection, Path, State},
    response::Html,
    routing::get,
    Router,
};
use tower_sessions::Session;
use tracing::{instrument, warn};

use crate::{
    auth::{extractors::ActiveUser, session},
    error::AppError,
    state::AppState,
    views::{self, DashboardPage, PaymentPage},
};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/payment/:user_id", get(payment))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn dashboard(
    ActiveUser(user): ActiveUser,
    session: Session,
) -> Result<Html<String>, AppError> {
    let flashes = session::take_flashes(&session).await?;
    views::render(DashboardPage::new(&flashes, &user))
}

/// Payment placeholder. Users see their own page; admins may view anyone's.
#[instrument(skip_all, fields(viewer_id = viewer.id))]
pub async fn payment(
    State(state): State<AppState>,
    ActiveUser(viewer): ActiveUser,
    session: Session,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Html<String>, AppError> {
    let Ok(Path(user_id)) = path else {
        return Err(AppError::NotFound("user"));
    };
    if viewer.id != user_id && !viewer.is_admin {
        warn!(target_id = user_id, "payment page of another user requested");
        return Err(AppError::Forbidden);
    }

    let target = if viewer.id == user_id {
        viewer
    } else {
        state
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("user"))?
    };

    let flashes = session::take_flashes(&session).await?;
    views::render(PaymentPage::new(&flashes, &target))
}
