//! Optimistic call sites: like, follow, comment.

use chrono::Utc;
use pawsitive_common::id::{prefix, prefixed_ulid};

use crate::api::{ApiClient, FollowResponse, LikeResponse};
use crate::error::ClientError;
use crate::models::{Comment, Post, User, UserRef};
use crate::optimistic::Optimistic;
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostLikeState {
    pub liked: bool,
    pub likes: u64,
}

impl PostLikeState {
    pub fn of(post: &Post) -> Self {
        Self {
            liked: post.is_liked,
            likes: post.likes,
        }
    }

    pub fn toggled(&self) -> Self {
        if self.liked {
            Self {
                liked: false,
                likes: self.likes.saturating_sub(1),
            }
        } else {
            Self {
                liked: true,
                likes: self.likes + 1,
            }
        }
    }

    /// Server-reported fields win over the proposal.
    pub fn reconcile(self, response: &LikeResponse) -> Self {
        Self {
            liked: response.is_liked.unwrap_or(self.liked),
            likes: response.likes.unwrap_or(self.likes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowState {
    pub following: bool,
    pub followers: u64,
}

impl FollowState {
    /// Uses the explicit `isFollowing` flag; a non-zero follower count says
    /// nothing about the viewer.
    pub fn of(user: &User) -> Self {
        Self {
            following: user.is_following.unwrap_or(false),
            followers: user.followers_count,
        }
    }

    pub fn toggled(&self) -> Self {
        if self.following {
            Self {
                following: false,
                followers: self.followers.saturating_sub(1),
            }
        } else {
            Self {
                following: true,
                followers: self.followers + 1,
            }
        }
    }

    pub fn reconcile(self, response: &FollowResponse) -> Self {
        Self {
            following: response.is_following.unwrap_or(self.following),
            followers: response.followers_count.unwrap_or(self.followers),
        }
    }
}

pub async fn toggle_like(
    api: &ApiClient,
    state: &Optimistic<PostLikeState>,
    post_id: &str,
) -> Result<PostLikeState, ClientError> {
    let (settled, _) = state
        .mutate_with(
            PostLikeState::toggled,
            |_| api.like_post(post_id),
            PostLikeState::reconcile,
        )
        .await?;
    Ok(settled)
}

/// A like pushed by someone else on a post the viewer is looking at. The
/// viewer's own likes are already applied optimistically and are ignored.
pub fn apply_remote_like(state: &Optimistic<PostLikeState>, sender_id: &str, viewer_id: &str) {
    if sender_id == viewer_id {
        return;
    }
    state.rebase(|s| PostLikeState {
        likes: s.likes + 1,
        ..*s
    });
}

pub async fn toggle_follow(
    api: &ApiClient,
    state: &Optimistic<FollowState>,
    user_id: &str,
    viewer_id: &str,
) -> Result<FollowState, ClientError> {
    if user_id == viewer_id {
        return Err(ClientError::field("user", "You cannot follow yourself"));
    }
    let (settled, _) = state
        .mutate_with(
            FollowState::toggled,
            |proposed| async move {
                if proposed.following {
                    api.follow(user_id).await
                } else {
                    api.unfollow(user_id).await
                }
            },
            FollowState::reconcile,
        )
        .await?;
    Ok(settled)
}

/// Append a comment immediately under a placeholder id, then swap in the
/// server's record.
pub async fn add_comment(
    api: &ApiClient,
    comments: &Optimistic<Vec<Comment>>,
    post_id: &str,
    author: &UserRef,
    text: &str,
) -> Result<Comment, ClientError> {
    validation::text_body("text", text)?;

    let placeholder = Comment {
        id: prefixed_ulid(prefix::PENDING_COMMENT),
        user: author.clone(),
        text: text.trim().to_string(),
        post: Some(post_id.to_string()),
        created_at: Some(Utc::now()),
    };
    let pending_id = placeholder.id.clone();

    let (_, created) = comments
        .mutate_with(
            |current| {
                let mut next = current.clone();
                next.push(placeholder);
                next
            },
            |_| api.create_comment(post_id, text.trim()),
            |mut list, created: &Comment| {
                if let Some(slot) = list.iter_mut().find(|c| c.id == pending_id) {
                    *slot = created.clone();
                }
                list
            },
        )
        .await?;
    Ok(created)
}

pub async fn remove_comment(
    api: &ApiClient,
    comments: &Optimistic<Vec<Comment>>,
    comment_id: &str,
) -> Result<(), ClientError> {
    comments
        .mutate(
            |current| current.iter().filter(|c| c.id != comment_id).cloned().collect(),
            |_| api.delete_comment(comment_id),
        )
        .await?;
    Ok(())
}
