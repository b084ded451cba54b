use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::comment::Comment;
use super::user::UserRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: UserRef,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub images: Vec<String>,
    /// Like count. The backend sends either a number or the array of liker ids.
    #[serde(default, deserialize_with = "count_or_len")]
    pub likes: u64,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn count_or_len<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CountOrList {
        Count(u64),
        List(Vec<serde_json::Value>),
    }

    Ok(match Option::<CountOrList>::deserialize(deserializer)? {
        Some(CountOrList::Count(n)) => n,
        Some(CountOrList::List(items)) => items.len() as u64,
        None => 0,
    })
}

/// An image picked for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Guess the content type from the file extension.
    pub fn from_path_bytes(file_name: &str, bytes: Vec<u8>) -> Self {
        let lower = file_name.to_ascii_lowercase();
        let content_type = if lower.ends_with(".png") {
            "image/png"
        } else if lower.ends_with(".gif") {
            "image/gif"
        } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            "image/jpeg"
        } else {
            "application/octet-stream"
        };
        Self::new(file_name, content_type, bytes)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub caption: String,
    pub images: Vec<ImageUpload>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_json(likes: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "_id": "p1",
            "user": { "_id": "u1", "username": "daisy" },
            "caption": "walk time",
            "likes": likes,
            "createdAt": "2024-05-01T10:00:00Z"
        })
    }

    #[test]
    fn likes_accepts_count() {
        let post: Post = serde_json::from_value(post_json(serde_json::json!(4))).unwrap();
        assert_eq!(post.likes, 4);
        assert!(!post.is_liked);
    }

    #[test]
    fn likes_accepts_liker_list() {
        let post: Post = serde_json::from_value(post_json(serde_json::json!(["u2", "u3"]))).unwrap();
        assert_eq!(post.likes, 2);
    }

    #[test]
    fn likes_accepts_null() {
        let post: Post = serde_json::from_value(post_json(serde_json::Value::Null)).unwrap();
        assert_eq!(post.likes, 0);
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(ImageUpload::from_path_bytes("a.JPG", vec![]).content_type, "image/jpeg");
        assert_eq!(ImageUpload::from_path_bytes("a.webp", vec![]).content_type, "application/octet-stream");
    }
}
