use reqwest::Method;

use super::ApiClient;
use crate::error::ClientError;
use crate::models::Comment;

impl ApiClient {
    pub async fn comments(&self, post_id: &str) -> Result<Vec<Comment>, ClientError> {
        let request = self.authed(Method::GET, &format!("/comment/{post_id}"))?;
        self.send_json(request).await
    }

    pub async fn create_comment(&self, post_id: &str, text: &str) -> Result<Comment, ClientError> {
        let request = self
            .authed(Method::POST, "/comment")?
            .json(&serde_json::json!({ "postId": post_id, "text": text }));
        self.send_json(request).await
    }

    pub async fn delete_comment(&self, comment_id: &str) -> Result<(), ClientError> {
        let request = self.authed(Method::DELETE, &format!("/comment/{comment_id}"))?;
        self.send_unit(request).await
    }
}
