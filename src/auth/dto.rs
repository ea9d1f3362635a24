use serde::Deserialize;

/// Form body shared by registration and login.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
    pub csrf_token: String,
}
