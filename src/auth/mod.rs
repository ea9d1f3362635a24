use crate::state::AppState;
use axum::Router;

pub mod csrf;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod memory;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod session;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
