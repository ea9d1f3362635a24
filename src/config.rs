use anyhow::{bail, Context};
use rand::{rngs::OsRng, RngCore};

/// Minimum key length accepted by the signed session cookie.
pub const SESSION_SECRET_MIN_LEN: usize = 64;

/// Upper bound for `SUBSCRIPTION_DAYS`, roughly ten years.
pub const MAX_SUBSCRIPTION_DAYS: i64 = 3650;

#[derive(Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub session_secret: Vec<u8>,
    pub cookie_secure: bool,
    pub email_domain: String,
    pub subscription_days: i64,
    pub admin: Option<AdminBootstrap>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let session_secret = match std::env::var("SESSION_SECRET") {
            Ok(secret) => {
                if secret.len() < SESSION_SECRET_MIN_LEN {
                    bail!("SESSION_SECRET must be at least {SESSION_SECRET_MIN_LEN} bytes");
                }
                secret.into_bytes()
            }
            Err(_) => {
                tracing::warn!("SESSION_SECRET not set; generated a random key, sessions will not survive a restart");
                random_secret()
            }
        };

        let cookie_secure = match std::env::var("COOKIE_SECURE") {
            Ok(v) => v.parse::<bool>().context("COOKIE_SECURE must be true or false")?,
            Err(_) => false,
        };

        let subscription_days = match std::env::var("SUBSCRIPTION_DAYS") {
            Ok(v) => v
                .parse::<i64>()
                .context("SUBSCRIPTION_DAYS must be an integer")?,
            Err(_) => 30,
        };
        if !(1..=MAX_SUBSCRIPTION_DAYS).contains(&subscription_days) {
            bail!("SUBSCRIPTION_DAYS must be between 1 and {MAX_SUBSCRIPTION_DAYS}");
        }

        let email_domain = std::env::var("EMAIL_DOMAIN")
            .map(|d| d.trim().to_lowercase())
            .unwrap_or_else(|_| "@speedmail.com".into());
        if email_domain.is_empty() {
            bail!("EMAIL_DOMAIN must not be empty");
        }

        let admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(AdminBootstrap {
                email: email.trim().to_lowercase(),
                password,
            }),
            (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
                bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together")
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            session_secret,
            cookie_secure,
            email_domain,
            subscription_days,
            admin,
        })
    }
}

fn random_secret() -> Vec<u8> {
    let mut buf = vec![0u8; SESSION_SECRET_MIN_LEN];
    OsRng.fill_bytes(&mut buf);
    buf
}
