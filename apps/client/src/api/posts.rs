use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::{Deserialize, Deserializer};

use super::ApiClient;
use crate::error::ClientError;
use crate::models::{NewPost, Post};
use crate::validation;

/// Body of `POST /like/{id}`. The like endpoint toggles, and may report the
/// server-side count and state which then replace the optimistic values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    #[serde(default, deserialize_with = "optional_count")]
    pub likes: Option<u64>,
    #[serde(default, alias = "liked")]
    pub is_liked: Option<bool>,
}

fn optional_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CountOrList {
        Count(u64),
        List(Vec<serde_json::Value>),
    }

    Ok(Option::<CountOrList>::deserialize(deserializer)?.map(|v| match v {
        CountOrList::Count(n) => n,
        CountOrList::List(items) => items.len() as u64,
    }))
}

impl ApiClient {
    pub async fn posts(&self) -> Result<Vec<Post>, ClientError> {
        let request = self.authed(Method::GET, "/post")?;
        self.send_json(request).await
    }

    pub async fn feed(&self) -> Result<Vec<Post>, ClientError> {
        let request = self.authed(Method::GET, "/feed")?;
        self.send_json(request).await
    }

    pub async fn post(&self, post_id: &str) -> Result<Post, ClientError> {
        let request = self.authed(Method::GET, &format!("/post/{post_id}"))?;
        self.send_json(request).await
    }

    pub async fn user_posts(&self, user_id: &str) -> Result<Vec<Post>, ClientError> {
        let request = self.authed(Method::GET, &format!("/post/user/{user_id}"))?;
        self.send_json(request).await
    }

    /// Multipart upload, validated before anything is sent.
    pub async fn create_post(&self, post: &NewPost) -> Result<Post, ClientError> {
        validation::new_post(post)?;
        let mut form = Form::new().text("caption", post.caption.clone());
        for image in &post.images {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.content_type)
                .map_err(|_| ClientError::field("images", "Unsupported image type"))?;
            form = form.part("images", part);
        }
        let request = self.authed(Method::POST, "/post")?.multipart(form);
        self.send_json(request).await
    }

    pub async fn like_post(&self, post_id: &str) -> Result<LikeResponse, ClientError> {
        let request = self.authed(Method::POST, &format!("/like/{post_id}"))?;
        self.send_json(request).await
    }
}
