use serde::{Deserialize, Serialize};

/// Message shown when the server gives no usable explanation.
pub const FALLBACK_MESSAGE: &str = "Request failed";

/// One failed client-side validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Coarse classification used to decide who handles an error.
///
/// `Validation` and `Auth` stay with the initiating view; `Network` and
/// `Server` escalate to the containing view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Auth,
    Validation,
    Server,
}

/// Client-level error type shared by every SDK operation.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("not authenticated")]
    Unauthenticated,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("token storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn validation(details: Vec<FieldError>) -> Self {
        Self::Validation(details)
    }

    pub fn field(field: &str, message: &str) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Unauthenticated | Self::InvalidCredentials => ErrorKind::Auth,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Server { .. } | Self::Decode(_) | Self::Storage(_) => ErrorKind::Server,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Text a view renders for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(details) => details
                .first()
                .map(|d| d.message.clone())
                .unwrap_or_else(|| "Validation failed".to_string()),
            Self::Server { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Server { .. } | Self::Decode(_) | Self::Storage(_) => FALLBACK_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            tracing::warn!(?err, "response decode error");
            return Self::Decode(err.to_string());
        }
        tracing::debug!(?err, "transport error");
        Self::Network(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!(?err, "token storage I/O error");
        Self::Storage(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Server error bodies
// ---------------------------------------------------------------------------

/// Error body shapes the backend is known to send.
///
/// Either a flat `{"message": ".."}` or the nested
/// `{"error": {"code": "..", "message": ".."}}` form.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message
            .or_else(|| self.error.and_then(|e| e.message))
            .filter(|m| !m.trim().is_empty())
    }
}

/// Build a `Server` error from a status code and raw body text.
pub fn server_error(status: u16, body: &str) -> ClientError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(ApiErrorBody::into_message)
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
    ClientError::Server { status, message }
}
