use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::repo_types::User;
use crate::db::{is_unique_violation, RepoError, RepoResult};

const USER_COLUMNS: &str = "id, email, password_hash, is_admin, is_active, payment_verified, \
                            subscription_start, subscription_end, created_at";

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: i64) -> RepoResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Inserts an inactive, unpaid user. Fails with `DuplicateEmail` if the email is taken.
    async fn create(&self, email: &str, password_hash: &str) -> RepoResult<User>;
    /// Users awaiting approval (`is_active = false`), oldest first.
    async fn list_pending(&self) -> RepoResult<Vec<User>>;
    /// Marks the user active and paid for the given window. `None` if the id is unknown.
    async fn activate(
        &self,
        id: i64,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> RepoResult<Option<User>>;
    /// Creates or promotes an admin account with no subscription end. The stored
    /// password is always replaced with `password_hash`.
    async fn ensure_admin(&self, email: &str, password_hash: &str) -> RepoResult<User>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, email: &str, password_hash: &str) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepoError::DuplicateEmail
            } else {
                RepoError::Database(e)
            }
        })
    }

    async fn list_pending(&self) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE NOT is_active ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn activate(
        &self,
        id: i64,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET is_active = TRUE,
                   payment_verified = TRUE,
                   subscription_start = $2,
                   subscription_end = $3
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn ensure_admin(&self, email: &str, password_hash: &str) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, is_admin, is_active, payment_verified, subscription_start)
            VALUES ($1, $2, TRUE, TRUE, TRUE, now())
            ON CONFLICT (email) DO UPDATE
               SET password_hash = EXCLUDED.password_hash,
                   is_admin = TRUE,
                   is_active = TRUE,
                   payment_verified = TRUE,
                   subscription_end = NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}
