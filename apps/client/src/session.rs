//! Session store: who is logged in, and the token that proves it.
//!
//! Single writer for the credential slot and the persisted token. Every
//! transition is published on a `watch` channel before the call returns.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use crate::api::ApiClient;
use crate::auth::{AuthToken, Credentials, TokenError, TokenStore};
use crate::error::ClientError;
use crate::models::{Registration, User};
use crate::validation;

/// The authenticated identity active in this client.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub token: AuthToken,
}

impl Session {
    fn from_user(user: &User, token: AuthToken) -> Self {
        Self {
            user_id: user.id.clone(),
            display_name: user.display_name().to_string(),
            avatar: user.profile_picture.clone(),
            token,
        }
    }

    /// Identity derived from token claims only, used when the profile
    /// cannot be fetched.
    fn from_claims(token: AuthToken) -> Self {
        Self {
            user_id: token.user_id().to_string(),
            display_name: token
                .username()
                .unwrap_or_else(|| token.user_id())
                .to_string(),
            avatar: None,
            token,
        }
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id && self.token.as_str() == other.token.as_str()
    }
}

struct Inner {
    api: ApiClient,
    credentials: Credentials,
    store: Arc<dyn TokenStore>,
    tx: watch::Sender<Option<Session>>,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// `api` must have been built with the same `Credentials` handle.
    pub fn new(api: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                credentials: api.credentials().clone(),
                api,
                store,
                tx,
            }),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.tx.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.tx.subscribe()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        validation::login(email, password)?;

        let response = match self.inner.api.login(email.trim(), password).await {
            Ok(r) => r,
            Err(ClientError::Unauthenticated) | Err(ClientError::Server { status: 400, .. }) => {
                tracing::info!("login rejected");
                return Err(ClientError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        let raw = response.token.ok_or_else(|| {
            tracing::warn!("login response carried no token");
            ClientError::Decode("login response has no token".into())
        })?;
        let token = AuthToken::parse_valid_at(&raw, Utc::now()).map_err(|e| {
            tracing::warn!(error = %e, "login returned unusable token");
            ClientError::InvalidCredentials
        })?;

        self.inner.store.save(token.as_str()).await?;
        self.inner.credentials.set(token.clone());

        let session = match response.user.filter(|u| u.id == token.user_id()) {
            Some(user) => Session::from_user(&user, token),
            None => match self.inner.api.user(token.user_id()).await {
                Ok(user) => Session::from_user(&user, token),
                Err(ClientError::Unauthenticated) => {
                    tracing::warn!("token rejected right after login");
                    self.clear_local().await;
                    return Err(ClientError::Unauthenticated);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "profile fetch after login failed, using token claims");
                    Session::from_claims(token)
                }
            },
        };

        tracing::info!(user_id = %session.user_id, "logged in");
        self.inner.tx.send_replace(Some(session.clone()));
        Ok(session)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, form: &Registration) -> Result<(), ClientError> {
        validation::registration(form)?;
        self.inner.api.register(form).await?;
        tracing::info!(username = %form.username, "registered");
        Ok(())
    }

    /// Restore the session from the persisted token, if it is still usable.
    pub async fn resume(&self) -> Result<Option<Session>, ClientError> {
        let Some(raw) = self.inner.store.load().await? else {
            return Ok(None);
        };

        let token = match AuthToken::parse_valid_at(&raw, Utc::now()) {
            Ok(token) => token,
            Err(e) => {
                match e {
                    TokenError::Expired => tracing::info!("stored token expired"),
                    other => tracing::warn!(error = %other, "stored token unusable"),
                }
                self.clear_local().await;
                return Ok(None);
            }
        };

        self.inner.credentials.set(token.clone());
        let session = match self.inner.api.user(token.user_id()).await {
            Ok(user) => Session::from_user(&user, token),
            Err(ClientError::Unauthenticated) => {
                tracing::info!("stored token rejected by server");
                self.clear_local().await;
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "profile fetch failed, resuming from token claims");
                Session::from_claims(token)
            }
        };

        tracing::info!(user_id = %session.user_id, "session resumed");
        self.inner.tx.send_replace(Some(session.clone()));
        Ok(Some(session))
    }

    /// Clear the session. Always succeeds locally; the remote call is
    /// best-effort.
    pub async fn logout(&self) {
        let token = self.inner.credentials.current();
        self.clear_local().await;

        if let Some(token) = token {
            tracing::info!(user_id = %token.user_id(), "logged out");
            if let Err(e) = self.inner.api.logout(token.as_str()).await {
                tracing::debug!(error = %e, "remote logout failed");
            }
        }
    }

    /// Pass `result` through, logging out first when the server no longer
    /// accepts the token.
    pub async fn check<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ClientError::Unauthenticated) = &result {
            if self.is_authenticated() {
                tracing::info!("server rejected session, logging out");
                self.clear_local().await;
            }
        }
        result
    }

    async fn clear_local(&self) {
        self.inner.credentials.take();
        if let Err(e) = self.inner.store.clear().await {
            tracing::error!(error = %e, "failed to clear persisted token");
        }
        self.inner.tx.send_if_modified(|current| current.take().is_some());
    }
}
