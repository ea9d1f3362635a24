use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use sqlx::PgPool;
use time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::{
    cookie::{Key, SameSite},
    ExpiredDeletion, Expiry, MemoryStore, SessionManagerLayer, SessionStore,
};
use tower_sessions_sqlx_store::PostgresStore;

use crate::state::AppState;
use crate::{account, admin, auth};

pub const SESSION_COOKIE: &str = "speedmail_session";
/// Sessions untouched for this long are dropped by the store.
pub const SESSION_IDLE: Duration = Duration::hours(12);
const SESSION_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Builds the router on the store that matches the state: the shared Postgres
/// pool when there is one, process memory otherwise.
pub async fn build_app_for(state: AppState) -> anyhow::Result<Router> {
    match state.db.clone() {
        Some(db) => {
            let store = postgres_sessions(db).await?;
            build_app(state, store)
        }
        None => {
            tracing::warn!("session records are kept in memory and only expire on access");
            build_app(state, MemoryStore::default())
        }
    }
}

/// Session table in Postgres, plus a background task that deletes expired rows.
pub async fn postgres_sessions(db: PgPool) -> anyhow::Result<PostgresStore> {
    let store = PostgresStore::new(db);
    store.migrate().await.context("migrate session table")?;

    let sweeper = store.clone();
    tokio::spawn(async move {
        if let Err(e) = sweeper.continuously_delete_expired(SESSION_SWEEP_INTERVAL).await {
            tracing::error!(error = %e, "expired session sweep stopped");
        }
    });
    Ok(store)
}

pub fn build_app<S>(state: AppState, store: S) -> anyhow::Result<Router>
where
    S: SessionStore + Clone,
{
    let key = Key::try_from(state.config.session_secret.as_slice())
        .context("session secret is too short for a signing key")?;
    let sessions = SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_secure(state.config.cookie_secure)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_path("/")
        .with_expiry(Expiry::OnInactivity(SESSION_IDLE))
        .with_signed(key);

    let app = Router::new()
        .merge(auth::router())
        .merge(account::handlers::account_routes())
        .merge(admin::handlers::admin_routes())
        .with_state(state)
        .layer(sessions)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        );
    Ok(app)
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
