use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::auth::{repo::UserRepo, repo_types::User};
use crate::db::{RepoError, RepoResult};

/// Process-local user store used in tests and when no database is configured.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<Vec<User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_id(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> RepoResult<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == email) {
            return Err(RepoError::DuplicateEmail);
        }
        let user = User {
            id: users.last().map_or(1, |u| u.id + 1),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            is_admin: false,
            is_active: false,
            payment_verified: false,
            subscription_start: None,
            subscription_end: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn list_pending(&self) -> RepoResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| !u.is_active)
            .cloned()
            .collect())
    }

    async fn activate(
        &self,
        id: i64,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> RepoResult<Option<User>> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.is_active = true;
        user.payment_verified = true;
        user.subscription_start = Some(start);
        user.subscription_end = Some(end);
        Ok(Some(user.clone()))
    }

    async fn ensure_admin(&self, email: &str, password_hash: &str) -> RepoResult<User> {
        if self.find_by_email(email).await?.is_none() {
            match self.create(email, password_hash).await {
                Ok(_) | Err(RepoError::DuplicateEmail) => {}
                Err(e) => return Err(e),
            }
        }
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.email == email)
            .ok_or(RepoError::Database(sqlx::Error::RowNotFound))?;
        user.password_hash = password_hash.to_string();
        user.is_admin = true;
        user.is_active = true;
        user.payment_verified = true;
        user.subscription_start.get_or_insert_with(OffsetDateTime::now_utc);
        user.subscription_end = None;
        Ok(user.clone())
    }
}
