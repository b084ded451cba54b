use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Deserialize;

use super::ApiClient;
use crate::error::ClientError;
use crate::models::{ProfileUpdate, User, UserStats};
use crate::validation;

/// Body of the follow/unfollow endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    #[serde(default)]
    pub followers_count: Option<u64>,
    #[serde(default)]
    pub is_following: Option<bool>,
}

impl ApiClient {
    pub async fn user(&self, user_id: &str) -> Result<User, ClientError> {
        let request = self.authed(Method::GET, &format!("/user/{user_id}"))?;
        self.send_json(request).await
    }

    pub async fn user_stats(&self, user_id: &str) -> Result<UserStats, ClientError> {
        let request = self.authed(Method::GET, &format!("/user/{user_id}/stats"))?;
        self.send_json(request).await
    }

    pub async fn search_users(&self, term: &str) -> Result<Vec<User>, ClientError> {
        let request = self
            .authed(Method::GET, "/user/search")?
            .query(&[("q", term)]);
        self.send_json(request).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ClientError> {
        let mut form = Form::new();
        if let Some(name) = &update.name {
            form = form.text("name", name.clone());
        }
        if let Some(bio) = &update.bio {
            form = form.text("bio", bio.clone());
        }
        if let Some(avatar) = &update.avatar {
            validation::avatar(avatar)?;
            let part = Part::bytes(avatar.bytes.clone())
                .file_name(avatar.file_name.clone())
                .mime_str(&avatar.content_type)
                .map_err(|_| ClientError::field("avatar", "Unsupported image type"))?;
            form = form.part("avatar", part);
        }
        let request = self.authed(Method::PUT, "/user/update")?.multipart(form);
        self.send_json(request).await
    }

    pub async fn follow(&self, user_id: &str) -> Result<FollowResponse, ClientError> {
        let request = self.authed(Method::POST, &format!("/user/follow/{user_id}"))?;
        self.send_json(request).await
    }

    pub async fn unfollow(&self, user_id: &str) -> Result<FollowResponse, ClientError> {
        let request = self.authed(Method::POST, &format!("/user/unfollow/{user_id}"))?;
        self.send_json(request).await
    }
}
