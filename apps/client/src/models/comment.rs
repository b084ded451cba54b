use chrono::{DateTime, Utc};
use pawsitive_common::id;
use serde::{Deserialize, Serialize};

use super::user::UserRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: UserRef,
    pub text: String,
    #[serde(default)]
    pub post: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Still the optimistic placeholder, not yet replaced by the server's record.
    pub fn is_pending(&self) -> bool {
        id::is_pending_comment(&self.id)
    }
}
