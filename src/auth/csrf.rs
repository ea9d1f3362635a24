use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;
use tower_sessions::{session, Session};

pub const CSRF_TOKEN_KEY: &str = "_csrf_token";
const TOKEN_BYTES: usize = 32;

/// Returns the session's CSRF token, minting and storing one on first use.
pub async fn get_or_create_token(session: &Session) -> Result<String, session::Error> {
    if let Some(token) = session.get::<String>(CSRF_TOKEN_KEY).await? {
        return Ok(token);
    }
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let token = Base64UrlUnpadded::encode_string(&bytes);
    session.insert(CSRF_TOKEN_KEY, &token).await?;
    Ok(token)
}

/// True iff the session holds a token and `submitted` matches it.
pub async fn validate(session: &Session, submitted: &str) -> Result<bool, session::Error> {
    let Some(expected) = session.get::<String>(CSRF_TOKEN_KEY).await? else {
        return Ok(false);
    };
    if submitted.is_empty() {
        return Ok(false);
    }
    Ok(expected.as_bytes().ct_eq(submitted.as_bytes()).into())
}
