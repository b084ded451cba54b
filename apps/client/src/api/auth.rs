use reqwest::Method;
use serde::Deserialize;

use super::{execute, ApiClient};
use crate::error::ClientError;
use crate::models::{Registration, User};

/// Body of `POST /user/login`. Some backend versions embed the user record.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl ApiClient {
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let request = self
            .public(Method::POST, "/user/login")
            .json(&serde_json::json!({ "email": email, "password": password }));
        self.send_json(request).await
    }

    pub async fn register(&self, form: &Registration) -> Result<(), ClientError> {
        let mut body = serde_json::json!({
            "username": form.username,
            "email": form.email,
            "password": form.password,
        });
        if let Some(name) = form.name.as_deref().filter(|n| !n.trim().is_empty()) {
            body["name"] = serde_json::Value::String(name.to_string());
        }
        let request = self.public(Method::POST, "/user/register").json(&body);
        self.send_unit(request).await
    }

    /// Tell the backend the given token is done. Sent with the outgoing
    /// token explicitly because the local slot is already cleared.
    pub async fn logout(&self, token: &str) -> Result<(), ClientError> {
        let request = self
            .public(Method::POST, "/user/logout")
            .bearer_auth(token);
        execute(request).await.map(|_| ())
    }
}
