//! Router-level test client that carries the session cookie between requests.

use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    Router,
};
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use crate::{app::build_app, auth::password, auth::repo_types::User, state::AppState};

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or("")
    }
}

pub struct TestClient {
    pub state: AppState,
    app: Router,
    cookie: Option<String>,
}

impl TestClient {
    pub fn new() -> Self {
        Self::with_state(AppState::fake())
    }

    pub fn with_state(state: AppState) -> Self {
        let app = build_app(state.clone(), MemoryStore::default()).expect("test app");
        Self {
            state,
            app,
            cookie: None,
        }
    }

    /// Same store, fresh browser.
    pub fn new_browser(&self) -> Self {
        Self {
            state: self.state.clone(),
            app: self.app.clone(),
            cookie: None,
        }
    }

    pub fn set_cookie(&mut self, pair: &str) {
        self.cookie = Some(pair.to_string());
    }

    async fn send(&mut self, mut req: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            req.headers_mut().insert(COOKIE, cookie.parse().unwrap());
        }
        let res = self.app.clone().oneshot(req).await.unwrap();
        if let Some(set) = res.headers().get(SET_COOKIE) {
            let pair = set.to_str().unwrap().split(';').next().unwrap().to_string();
            self.cookie = Some(pair);
        }
        let status = res.status();
        let location = res
            .headers()
            .get(LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            location,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        self.send(req).await
    }

    pub async fn post_form(&mut self, path: &str, body: &str) -> TestResponse {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    /// Loads `form_path` and pulls the CSRF token out of the rendered form.
    pub async fn csrf_token(&mut self, form_path: &str) -> String {
        let page = self.get(form_path).await;
        let marker = r#"name="csrf_token" value=""#;
        let start = page.body.find(marker).expect("csrf field in form") + marker.len();
        let len = page.body[start..].find('"').unwrap();
        page.body[start..start + len].to_string()
    }

    pub async fn register(&mut self, email: &str, password: &str) -> TestResponse {
        let token = self.csrf_token("/register").await;
        let body = format!(
            "email={}&password={}&csrf_token={token}",
            email.replace('@', "%40"),
            password
        );
        self.post_form("/register", &body).await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> TestResponse {
        let token = self.csrf_token("/login").await;
        let body = format!(
            "email={}&password={}&csrf_token={token}",
            email.replace('@', "%40"),
            password
        );
        self.post_form("/login", &body).await
    }

    pub async fn seed_user(&self, email: &str, password: &str) -> User {
        let hash = password::hash(password).unwrap();
        self.state.users.create(email, &hash).await.unwrap()
    }

    pub async fn seed_active_user(&self, email: &str, password: &str) -> User {
        let user = self.seed_user(email, password).await;
        let now = OffsetDateTime::now_utc();
        self.state
            .users
            .activate(user.id, now, now + Duration::days(30))
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn seed_expired_user(&self, email: &str, password: &str) -> User {
        let user = self.seed_user(email, password).await;
        let now = OffsetDateTime::now_utc();
        self.state
            .users
            .activate(user.id, now - Duration::days(31), now - Duration::days(1))
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn seed_admin(&self, email: &str, password: &str) -> User {
        let hash = password::hash(password).unwrap();
        self.state.users.ensure_admin(email, &hash).await.unwrap()
    }
}
