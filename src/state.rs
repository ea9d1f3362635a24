use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::auth::{
    memory::MemoryUserRepo,
    password,
    repo::{PgUserRepo, UserRepo},
};
use crate::config::AppConfig;
use crate::messages::repo::{MemoryMessageRepo, MessageRepo, PgMessageRepo};

#[derive(Clone)]
pub struct AppState {
    /// Set when running against Postgres; the session store shares it.
    pub db: Option<PgPool>,
    pub users: Arc<dyn UserRepo>,
    pub messages: Arc<dyn MessageRepo>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let state = match &config.database_url {
            Some(url) => {
                let db = crate::db::connect(url).await?;
                Self {
                    db: Some(db.clone()),
                    ..Self::from_parts(
                        Arc::new(PgUserRepo::new(db.clone())),
                        Arc::new(PgMessageRepo::new(db)),
                        config.clone(),
                    )
                }
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory store, data is lost on exit");
                Self::from_parts(
                    Arc::new(MemoryUserRepo::new()),
                    Arc::new(MemoryMessageRepo::new()),
                    config.clone(),
                )
            }
        };

        if let Some(admin) = &config.admin {
            let hash = password::hash(&admin.password).context("hash admin password")?;
            let user = state
                .users
                .ensure_admin(&admin.email, &hash)
                .await
                .context("bootstrap admin account")?;
            tracing::info!(user_id = user.id, email = %user.email, "admin account ready");
        }

        Ok(state)
    }

    pub fn from_parts(
        users: Arc<dyn UserRepo>,
        messages: Arc<dyn MessageRepo>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db: None,
            users,
            messages,
            config,
        }
    }

    /// In-memory state with a fixed session key, for tests.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            session_secret: vec![7u8; crate::config::SESSION_SECRET_MIN_LEN],
            cookie_secure: false,
            email_domain: "@speedmail.com".into(),
            subscription_days: 30,
            admin: None,
        });
        Self::from_parts(
            Arc::new(MemoryUserRepo::new()),
            Arc::new(MemoryMessageRepo::new()),
            config,
        )
    }
}
