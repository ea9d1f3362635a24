use axum::{
    extract::State,
    response::{Html, Response},
    routing::get,
    Form, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        csrf,
        dto::CredentialsForm,
        extractors::status_message,
        password,
        repo_types::SubscriptionStatus,
        session::{self, FlashLevel},
    },
    db::RepoError,
    error::{redirect, AppError},
    state::AppState,
    views::{self, CredentialsPage},
};

const CSRF_ERROR: &str = "Invalid or missing CSRF token.";
const DUPLICATE_ERROR: &str = "Account already exists.";
/// Width of `users.email`.
const MAX_EMAIL_LEN: usize = 120;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/register", get(register_form).post(register))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Flashes `message` and sends the browser back to `location`.
async fn bounce(session: &Session, location: &str, message: &str) -> Result<Response, AppError> {
    session::flash(session, FlashLevel::Danger, message).await?;
    Ok(redirect(location))
}

pub async fn index(session: Session) -> Result<Response, AppError> {
    match session::session_user_id(&session).await? {
        Some(_) => Ok(redirect("/dashboard")),
        None => Ok(redirect("/login")),
    }
}

pub async fn register_form(session: Session) -> Result<Html<String>, AppError> {
    let token = csrf::get_or_create_token(&session).await?;
    let flashes = session::take_flashes(&session).await?;
    views::render(CredentialsPage::register(&flashes, &token))
}

#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, AppError> {
    if !csrf::validate(&session, &form.csrf_token).await? {
        warn!("register rejected: csrf token mismatch");
        return bounce(&session, "/register", CSRF_ERROR).await;
    }

    let email = normalize_email(&form.email);
    let domain = &state.config.email_domain;
    if !is_valid_email(&email) || !email.ends_with(domain.as_str()) {
        warn!(%email, "register rejected: email domain");
        return bounce(&session, "/register", &format!("Email must end with {domain}")).await;
    }

    if email.len() > MAX_EMAIL_LEN {
        warn!(len = email.len(), "register rejected: email too long");
        return bounce(
            &session,
            "/register",
            &format!("Email must be at most {MAX_EMAIL_LEN} characters."),
        )
        .await;
    }

    if form.password.is_empty() {
        warn!(%email, "register rejected: empty password");
        return bounce(&session, "/register", "Password is required.").await;
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "register rejected: email already registered");
        return bounce(&session, "/register", DUPLICATE_ERROR).await;
    }

    let hash = password::hash_blocking(form.password).await?;
    let user = match state.users.create(&email, &hash).await {
        Ok(u) => u,
        // lost a race with a concurrent registration
        Err(RepoError::DuplicateEmail) => {
            warn!(%email, "register rejected: unique constraint");
            return bounce(&session, "/register", DUPLICATE_ERROR).await;
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = user.id, email = %user.email, "user registered");
    session::flash(
        &session,
        FlashLevel::Success,
        "Registered successfully! Please login and pay to activate.",
    )
    .await?;
    Ok(redirect("/login"))
}

pub async fn login_form(session: Session) -> Result<Html<String>, AppError> {
    let token = csrf::get_or_create_token(&session).await?;
    let flashes = session::take_flashes(&session).await?;
    views::render(CredentialsPage::login(&flashes, &token))
}

#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, AppError> {
    if !csrf::validate(&session, &form.csrf_token).await? {
        warn!("login rejected: csrf token mismatch");
        return bounce(&session, "/login", CSRF_ERROR).await;
    }

    let email = normalize_email(&form.email);
    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(%email, "login rejected: unknown email");
        return bounce(&session, "/login", "User does not exist").await;
    };

    if !password::verify_blocking(user.password_hash.clone(), form.password).await? {
        warn!(%email, user_id = user.id, "login rejected: invalid password");
        return bounce(&session, "/login", "Invalid credentials").await;
    }

    let status = user.subscription_status(OffsetDateTime::now_utc());
    if status != SubscriptionStatus::Active {
        warn!(%email, user_id = user.id, ?status, "login rejected: subscription");
        return bounce(&session, "/login", status_message(status)).await;
    }

    session::log_in(&session, user.id).await?;
    info!(user_id = user.id, %email, "user logged in");
    session::flash(&session, FlashLevel::Success, "Logged in successfully").await?;
    Ok(redirect("/dashboard"))
}

#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Response, AppError> {
    if let Some(user_id) = session::session_user_id(&session).await? {
        info!(user_id, "user logged out");
    }
    session::log_out(&session).await?;
    session::flash(&session, FlashLevel::Success, "Logged out successfully.").await?;
    Ok(redirect("/login"))
}
