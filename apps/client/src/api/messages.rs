use reqwest::Method;

use super::ApiClient;
use crate::error::ClientError;
use crate::models::{Conversation, Message, MessagePage};
use crate::validation;

impl ApiClient {
    pub async fn conversations(&self) -> Result<Vec<Conversation>, ClientError> {
        let request = self.authed(Method::GET, "/chat")?;
        self.send_json(request).await
    }

    /// Open the conversation with `user_id`, creating it if needed.
    pub async fn open_conversation(&self, user_id: &str) -> Result<Conversation, ClientError> {
        let request = self
            .authed(Method::POST, "/chat")?
            .json(&serde_json::json!({ "userId": user_id }));
        self.send_json(request).await
    }

    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ClientError> {
        let request = self.authed(Method::GET, &format!("/message/{conversation_id}"))?;
        let page: MessagePage = self.send_json(request).await?;
        Ok(page.messages)
    }

    pub async fn search_messages(
        &self,
        conversation_id: &str,
        term: &str,
    ) -> Result<Vec<Message>, ClientError> {
        let request = self
            .authed(Method::GET, &format!("/message/{conversation_id}/search"))?
            .query(&[("q", term)]);
        let page: MessagePage = self.send_json(request).await?;
        Ok(page.messages)
    }

    pub async fn send_message(&self, conversation_id: &str, text: &str) -> Result<Message, ClientError> {
        validation::text_body("text", text)?;
        let request = self
            .authed(Method::POST, "/message")?
            .json(&serde_json::json!({ "conversationId": conversation_id, "text": text }));
        self.send_json(request).await
    }
}
