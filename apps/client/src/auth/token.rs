//! Bearer token parsing.
//!
//! The client never holds the signing key, so claims are read without
//! verifying the signature. The server re-validates on every request; the
//! client only needs the user id and the expiry to fail fast.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token has no user id claim")]
    MissingUserId,
    #[error("token has no expiry claim")]
    MissingExpiry,
    #[error("token expired")]
    Expired,
}

/// Claims the backend embeds in its tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "_id", alias = "sub", default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
}

/// A parsed bearer token with a known user id and expiry.
#[derive(Clone)]
pub struct AuthToken {
    raw: String,
    user_id: String,
    username: Option<String>,
    expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Parse a token and check it carries a user id and an expiry.
    ///
    /// Expiry itself is checked separately with [`AuthToken::validate_at`].
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let raw = raw.trim();
        jsonwebtoken::decode_header(raw).map_err(|e| TokenError::Malformed(e.to_string()))?;

        let payload = raw
            .split('.')
            .nth(1)
            .ok_or_else(|| TokenError::Malformed("missing payload segment".into()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let claims: TokenClaims =
            serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))?;

        let user_id = claims
            .user_id
            .filter(|id| !id.is_empty())
            .ok_or(TokenError::MissingUserId)?;
        let exp = claims.exp.ok_or(TokenError::MissingExpiry)?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| TokenError::Malformed(format!("bad exp {exp}")))?;

        Ok(Self {
            raw: raw.to_string(),
            user_id,
            username: claims.username,
            expires_at,
        })
    }

    /// Parse and reject tokens that are already expired at `now`.
    pub fn parse_valid_at(raw: &str, now: DateTime<Utc>) -> Result<Self, TokenError> {
        let token = Self::parse(raw)?;
        token.validate_at(now)?;
        Ok(token)
    }

    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if self.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
