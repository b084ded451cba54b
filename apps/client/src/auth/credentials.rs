use std::sync::Arc;

use parking_lot::RwLock;

use super::token::AuthToken;
use crate::error::ClientError;

/// Shared slot holding the active bearer token.
///
/// Only the session store writes it; the HTTP adapter reads it on every
/// authenticated request.
#[derive(Clone, Default)]
pub struct Credentials {
    slot: Arc<RwLock<Option<AuthToken>>>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, token: AuthToken) {
        *self.slot.write() = Some(token);
    }

    pub(crate) fn take(&self) -> Option<AuthToken> {
        self.slot.write().take()
    }

    pub fn current(&self) -> Option<AuthToken> {
        self.slot.read().clone()
    }

    /// The `Authorization` header value, or `Unauthenticated` when there is
    /// no token or it has expired. No request should be sent in that case.
    pub fn bearer(&self) -> Result<String, ClientError> {
        let guard = self.slot.read();
        match guard.as_ref() {
            Some(token) if !token.is_expired() => Ok(format!("Bearer {}", token.as_str())),
            Some(token) => {
                tracing::debug!(user_id = %token.user_id(), "token expired, refusing request");
                Err(ClientError::Unauthenticated)
            }
            None => Err(ClientError::Unauthenticated),
        }
    }
}
