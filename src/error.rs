use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use askama::Template;
use thiserror::Error;
use tracing::error;

use crate::{db::RepoError, views::ErrorPage};

/// Request-terminal failures. Validation problems are flashed and redirected instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("login required")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("template error: {0}")]
    Render(#[from] askama::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Error pages fall back to plain text if the template itself fails.
fn error_page(status: StatusCode, title: &str, detail: &str) -> Response {
    let html = ErrorPage::new(title, detail)
        .render()
        .unwrap_or_else(|_| detail.to_string());
    (status, Html(html)).into_response()
}

/// 302 Found to `location`.
pub fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthenticated => redirect("/login"),
            AppError::Forbidden => error_page(
                StatusCode::FORBIDDEN,
                "Forbidden",
                "You do not have access to this page.",
            ),
            AppError::NotFound(what) => {
                error_page(StatusCode::NOT_FOUND, "Not found", &format!("{what} not found"))
            }
            other => {
                error!(error = %other, "request failed");
                error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server error",
                    "Something went wrong.",
                )
            }
        }
    }
}
