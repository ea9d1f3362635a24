use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub is_admin: bool,
    pub is_active: bool,
    pub payment_verified: bool,
    pub subscription_start: Option<OffsetDateTime>,
    pub subscription_end: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Whether a user may hold an authenticated session right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    /// Not yet approved: inactive or payment unverified.
    Inactive,
    Expired,
}

impl User {
    pub fn subscription_status(&self, now: OffsetDateTime) -> SubscriptionStatus {
        if !(self.is_active && self.payment_verified) {
            return SubscriptionStatus::Inactive;
        }
        match self.subscription_end {
            Some(end) if end < now => SubscriptionStatus::Expired,
            _ => SubscriptionStatus::Active,
        }
    }
}
