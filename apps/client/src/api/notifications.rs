use reqwest::Method;

use super::ApiClient;
use crate::error::ClientError;
use crate::models::NotificationList;

impl ApiClient {
    pub async fn notifications(&self) -> Result<NotificationList, ClientError> {
        let request = self.authed(Method::GET, "/notification")?;
        self.send_json(request).await
    }

    pub async fn mark_notifications_read(&self, ids: &[String]) -> Result<(), ClientError> {
        let request = self
            .authed(Method::PUT, "/notification/read")?
            .json(&serde_json::json!({ "notificationIds": ids }));
        self.send_unit(request).await
    }

    /// `None` deletes every notification of the current user.
    pub async fn delete_notifications(&self, ids: Option<&[String]>) -> Result<(), ClientError> {
        let request = self
            .authed(Method::DELETE, "/notification")?
            .json(&serde_json::json!({ "notificationIds": ids }));
        self.send_unit(request).await
    }
}
