//! Server-rendered pages. Markup lives in `templates/`; askama escapes every
//! interpolated value.

use askama::Template;
use axum::response::Html;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::auth::{
    repo_types::User,
    session::{Flash, FlashLevel},
};
use crate::error::AppError;

impl FlashLevel {
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Danger => "danger",
        }
    }
}

fn timestamp(ts: Option<OffsetDateTime>) -> String {
    ts.and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| "-".into())
}

pub fn render<T: Template>(page: T) -> Result<Html<String>, AppError> {
    Ok(Html(page.render()?))
}

/// Register and login share one form.
#[derive(Template)]
#[template(path = "credentials.html")]
pub struct CredentialsPage<'a> {
    title: &'static str,
    flashes: &'a [Flash],
    action: &'static str,
    submit: &'static str,
    csrf_token: &'a str,
    alt_href: &'static str,
    alt_text: &'static str,
}

impl<'a> CredentialsPage<'a> {
    pub fn register(flashes: &'a [Flash], csrf_token: &'a str) -> Self {
        Self {
            title: "Register",
            flashes,
            action: "/register",
            submit: "Register",
            csrf_token,
            alt_href: "/login",
            alt_text: "Already registered? Log in",
        }
    }

    pub fn login(flashes: &'a [Flash], csrf_token: &'a str) -> Self {
        Self {
            title: "Login",
            flashes,
            action: "/login",
            submit: "Log in",
            csrf_token,
            alt_href: "/register",
            alt_text: "Create an account",
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardPage<'a> {
    title: &'static str,
    flashes: &'a [Flash],
    user_id: i64,
    email: &'a str,
    is_admin: bool,
    start: String,
    end: String,
}

impl<'a> DashboardPage<'a> {
    pub fn new(flashes: &'a [Flash], user: &'a User) -> Self {
        Self {
            title: "Dashboard",
            flashes,
            user_id: user.id,
            email: &user.email,
            is_admin: user.is_admin,
            start: timestamp(user.subscription_start),
            end: timestamp(user.subscription_end),
        }
    }
}

#[derive(Template)]
#[template(path = "payment.html")]
pub struct PaymentPage<'a> {
    title: &'static str,
    flashes: &'a [Flash],
    email: &'a str,
}

impl<'a> PaymentPage<'a> {
    pub fn new(flashes: &'a [Flash], target: &'a User) -> Self {
        Self {
            title: "Payment",
            flashes,
            email: &target.email,
        }
    }
}

pub struct PendingRow<'a> {
    id: i64,
    email: &'a str,
    registered: String,
}

#[derive(Template)]
#[template(path = "pending.html")]
pub struct PendingPage<'a> {
    title: &'static str,
    flashes: &'a [Flash],
    rows: Vec<PendingRow<'a>>,
}

impl<'a> PendingPage<'a> {
    pub fn new(flashes: &'a [Flash], pending: &'a [User]) -> Self {
        let rows = pending
            .iter()
            .map(|u| PendingRow {
                id: u.id,
                email: &u.email,
                registered: timestamp(Some(u.created_at)),
            })
            .collect();
        Self {
            title: "Pending users",
            flashes,
            rows,
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage<'a> {
    title: &'a str,
    flashes: &'a [Flash],
    detail: &'a str,
}

impl<'a> ErrorPage<'a> {
    pub fn new(title: &'a str, detail: &'a str) -> Self {
        Self {
            title,
            flashes: &[],
            detail,
        }
    }
}
