use anyhow::{anyhow, ensure, Context};
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Salted Argon2 PHC string for `plaintext`. Empty passwords are refused.
pub fn hash(plaintext: &str) -> anyhow::Result<String> {
    ensure!(!plaintext.is_empty(), "refusing to hash an empty password");
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|digest| digest.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash error");
            anyhow!("password hashing failed: {e}")
        })
}

/// Checks `plaintext` against a stored `digest`.
///
/// A wrong password is `Ok(false)`. A digest that does not parse, or that names
/// parameters this build cannot evaluate, is an error so that corrupt rows are
/// not mistaken for bad credentials.
pub fn verify(digest: &str, plaintext: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(digest).map_err(|e| {
        error!(error = %e, "stored password digest is malformed");
        anyhow!("malformed password digest: {e}")
    })?;
    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => {
            error!(error = %e, "argon2 verify error");
            Err(anyhow!("password verification failed: {e}"))
        }
    }
}

/// [`hash`] on the blocking pool, for request handlers.
pub async fn hash_blocking(plaintext: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash(&plaintext))
        .await
        .context("password hashing task panicked")?
}

/// [`verify`] on the blocking pool, for request handlers.
pub async fn verify_blocking(digest: String, plaintext: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify(&digest, &plaintext))
        .await
        .context("password verification task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digests_are_salted_and_hide_the_plaintext() {
        let first = hash("pw1").expect("hashing should succeed");
        let second = hash("pw1").expect("hashing should succeed");
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(!first.contains("pw1"));
        assert!(verify(&first, "pw1").unwrap());
        assert!(verify(&second, "pw1").unwrap());
    }

    #[test]
    fn wrong_password_is_false_not_an_error() {
        let digest = hash("correct-horse-battery-staple").unwrap();
        assert!(!verify(&digest, "wrong-password").expect("verify should not error"));
        assert!(!verify(&digest, "").expect("verify should not error"));
    }

    #[test]
    fn empty_password_is_never_hashed() {
        assert!(hash("").is_err());
    }

    #[test]
    fn malformed_digest_is_an_error() {
        let err = verify("not-a-valid-hash", "anything").unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[tokio::test]
    async fn blocking_wrappers_agree_with_sync_versions() {
        let digest = hash_blocking("pw1".into()).await.unwrap();
        assert!(verify(&digest, "pw1").unwrap());
        assert!(verify_blocking(digest.clone(), "pw1".into()).await.unwrap());
        assert!(!verify_blocking(digest, "pw2".into()).await.unwrap());
    }
}
