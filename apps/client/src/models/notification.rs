use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::user::UserRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Message,
    Like,
    Comment,
    Follow,
}

/// Where activating a notification takes the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Post(String),
    Profile(String),
    Conversation(String),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Self::Post(id) => format!("/post/{id}"),
            Self::Profile(id) => format!("/profile/{id}"),
            Self::Conversation(id) => format!("/messages?conversation={id}"),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A like/comment/follow/message occurrence, as listed by `GET /notification`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub sender: UserRef,
    /// Post the like/comment refers to (id or populated object).
    #[serde(default, deserialize_with = "id_or_ref")]
    pub post: Option<String>,
    /// Conversation a message notification refers to.
    #[serde(default, deserialize_with = "id_or_ref")]
    pub conversation: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
}

impl NotificationEvent {
    /// Navigation target: the post for likes/comments, the conversation for
    /// messages, the sender's profile otherwise.
    pub fn route(&self) -> Route {
        match self.kind {
            NotificationKind::Like | NotificationKind::Comment => match &self.post {
                Some(post) => Route::Post(post.clone()),
                None => Route::Profile(self.sender.id.clone()),
            },
            NotificationKind::Message => match &self.conversation {
                Some(conversation) => Route::Conversation(conversation.clone()),
                None => Route::Profile(self.sender.id.clone()),
            },
            NotificationKind::Follow => Route::Profile(self.sender.id.clone()),
        }
    }
}

/// Response body of `GET /notification`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    #[serde(default)]
    pub notifications: Vec<NotificationEvent>,
    #[serde(default)]
    pub unread_count: u64,
}

/// Accept either a bare id string or a populated `{ "_id": .. }` object.
pub(crate) fn id_or_ref<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Populated {
        #[serde(rename = "_id")]
        id: String,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdOrRef {
        Id(String),
        Ref(Populated),
    }

    Ok(Option::<IdOrRef>::deserialize(deserializer)?.map(|v| match v {
        IdOrRef::Id(id) => id,
        IdOrRef::Ref(populated) => populated.id,
    }))
}
