//! Typed push events.

use pawsitive_common::EventName;
use serde::Deserialize;
use serde_json::Value;

use crate::models::notification::id_or_ref;
use crate::models::{Message, NotificationKind, Route, UserRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageReceived,
    PostLiked,
    PostCommented,
    NewFollower,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        Self::MessageReceived,
        Self::PostLiked,
        Self::PostCommented,
        Self::NewFollower,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            EventName::MESSAGE_RECEIVED => Some(Self::MessageReceived),
            EventName::POST_LIKED => Some(Self::PostLiked),
            EventName::POST_COMMENTED => Some(Self::PostCommented),
            EventName::NEW_FOLLOWER => Some(Self::NewFollower),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::MessageReceived => EventName::MESSAGE_RECEIVED,
            Self::PostLiked => EventName::POST_LIKED,
            Self::PostCommented => EventName::POST_COMMENTED,
            Self::NewFollower => EventName::NEW_FOLLOWER,
        }
    }

    pub fn notification_kind(self) -> NotificationKind {
        match self {
            Self::MessageReceived => NotificationKind::Message,
            Self::PostLiked => NotificationKind::Like,
            Self::PostCommented => NotificationKind::Comment,
            Self::NewFollower => NotificationKind::Follow,
        }
    }
}

/// Payload of like/comment/follow pushes: a freshly created notification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub sender: UserRef,
    #[serde(default, deserialize_with = "id_or_ref")]
    pub post: Option<String>,
    /// Comment text, when the backend includes it.
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    MessageReceived(Message),
    PostLiked(Activity),
    PostCommented(Activity),
    NewFollower(Activity),
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("unknown event `{0}`")]
    Unknown(String),
    #[error("bad `{name}` payload: {source}")]
    Payload {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl RealtimeEvent {
    pub fn parse(name: &str, data: Value) -> Result<Self, EventError> {
        let kind = EventKind::from_name(name).ok_or_else(|| EventError::Unknown(name.to_string()))?;
        let bad = |source| EventError::Payload {
            name: kind.name(),
            source,
        };
        Ok(match kind {
            EventKind::MessageReceived => Self::MessageReceived(serde_json::from_value(data).map_err(bad)?),
            EventKind::PostLiked => Self::PostLiked(serde_json::from_value(data).map_err(bad)?),
            EventKind::PostCommented => Self::PostCommented(serde_json::from_value(data).map_err(bad)?),
            EventKind::NewFollower => Self::NewFollower(serde_json::from_value(data).map_err(bad)?),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageReceived(_) => EventKind::MessageReceived,
            Self::PostLiked(_) => EventKind::PostLiked,
            Self::PostCommented(_) => EventKind::PostCommented,
            Self::NewFollower(_) => EventKind::NewFollower,
        }
    }

    pub fn sender(&self) -> &UserRef {
        match self {
            Self::MessageReceived(m) => &m.sender,
            Self::PostLiked(a) | Self::PostCommented(a) | Self::NewFollower(a) => &a.sender,
        }
    }

    /// Where activating the matching alert navigates.
    pub fn route(&self) -> Route {
        match self {
            Self::MessageReceived(m) => match &m.conversation_id {
                Some(id) => Route::Conversation(id.clone()),
                None => Route::Profile(m.sender.id.clone()),
            },
            Self::PostLiked(a) | Self::PostCommented(a) => match &a.post {
                Some(post) => Route::Post(post.clone()),
                None => Route::Profile(a.sender.id.clone()),
            },
            Self::NewFollower(a) => Route::Profile(a.sender.id.clone()),
        }
    }
}
