//! WebSocket connect, close classification, and reconnect backoff.

use std::time::Duration;

use rand::Rng;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::Config;
use crate::error::ClientError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Exponential backoff with ±`jitter` randomization.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
    /// Fraction of the delay to randomize, in `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(10),
            max_attempts: None,
            jitter: 0.3,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base: config.reconnect_delay,
            max: config.max_reconnect_delay,
            max_attempts: config.max_reconnect_attempts,
            ..Self::default()
        }
    }

    /// Delay before reconnect attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis() as f64;
        let capped = (base_ms * 2f64.powi(attempt.min(30) as i32)).min(self.max.as_millis() as f64);
        let spread = capped * self.jitter.clamp(0.0, 1.0);
        let jittered = if spread > 0.0 {
            capped + rand::thread_rng().gen_range(-spread..=spread)
        } else {
            capped
        };
        Duration::from_millis(jittered.max(base_ms.min(capped)) as u64)
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

/// Why a connection ended, and whether to come back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// Do not reconnect.
    Terminal(String),
    /// Unexpected drop; back off and rejoin.
    Retry(String),
}

/// Normal (1000) and application (4000-4999) closes are final; everything
/// else, including a close without a frame, is an unexpected drop.
pub fn classify_close(frame: Option<&CloseFrame>) -> Disconnect {
    let Some(frame) = frame else {
        return Disconnect::Retry("closed without status".into());
    };
    let reason = format!("{} {}", u16::from(frame.code), frame.reason.as_str());
    match frame.code {
        CloseCode::Normal | CloseCode::Library(_) => Disconnect::Terminal(reason),
        _ => Disconnect::Retry(reason),
    }
}

pub async fn connect(url: &str) -> Result<WsStream, ClientError> {
    let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
        tracing::debug!(%url, error = %e, "gateway connect failed");
        ClientError::Network(e.to_string())
    })?;
    Ok(stream)
}
