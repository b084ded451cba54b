use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub participants: Vec<UserRef>,
    #[serde(default)]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// The other participant from `viewer_id`'s point of view.
    pub fn peer(&self, viewer_id: &str) -> Option<&UserRef> {
        self.participants.iter().find(|p| p.id != viewer_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub sender: UserRef,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// `GET /message/{id}` and the message search endpoint wrap results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub messages: Vec<Message>,
}
