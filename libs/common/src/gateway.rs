//! Realtime gateway opcodes, event names, and wire-format messages.
//!
//! Every frame is a JSON text message of the shape `{op, t?, s?, d}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_JOIN: u8 = 2;
pub const OP_SUBSCRIBE: u8 = 3;
pub const OP_HEARTBEAT_ACK: u8 = 6;
pub const OP_RECONNECT: u8 = 7;

/// Topic a client subscribes to in order to receive notification pushes.
pub const TOPIC_NOTIFICATIONS: &str = "notifications";

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default)]
    pub d: Value,
}

impl GatewayMessage {
    /// Build a DISPATCH message (op=0).
    pub fn dispatch(event_name: &str, seq: u64, data: Value) -> Self {
        Self {
            op: OP_DISPATCH,
            t: Some(event_name.to_string()),
            s: Some(seq),
            d: data,
        }
    }

    /// Build a RECONNECT message (op=7) telling the client to drop and rejoin.
    pub fn reconnect(reason: &str) -> Self {
        Self {
            op: OP_RECONNECT,
            t: None,
            s: None,
            d: serde_json::json!({ "reason": reason }),
        }
    }

    /// Build a HEARTBEAT_ACK message (op=6).
    pub fn heartbeat_ack(seq: u64) -> Self {
        Self {
            op: OP_HEARTBEAT_ACK,
            t: None,
            s: None,
            d: serde_json::json!({ "ack": seq }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// A message sent from the client to the server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
}

impl ClientMessage {
    /// JOIN binds the connection to a user id. Sent on every (re)connect.
    pub fn join(user_id: &str) -> Self {
        Self {
            op: OP_JOIN,
            d: serde_json::to_value(JoinPayload {
                user_id: user_id.to_string(),
            })
            .unwrap_or_default(),
        }
    }

    /// SUBSCRIBE opts the connection into pushes for the given topics.
    pub fn subscribe(topics: &[&str]) -> Self {
        Self {
            op: OP_SUBSCRIBE,
            d: serde_json::to_value(SubscribePayload {
                topics: topics.iter().map(|t| t.to_string()).collect(),
            })
            .unwrap_or_default(),
        }
    }

    pub fn heartbeat(seq: u64) -> Self {
        Self {
            op: OP_HEARTBEAT,
            d: serde_json::to_value(HeartbeatPayload { seq }).unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// JOIN payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinPayload {
    #[serde(rename = "userId")]
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// SUBSCRIBE payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribePayload {
    pub topics: Vec<String>,
}

// ---------------------------------------------------------------------------
// HEARTBEAT payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub seq: u64,
}

// ---------------------------------------------------------------------------
// Dispatch event types
// ---------------------------------------------------------------------------

/// Event names dispatched to clients.
pub struct EventName;

impl EventName {
    pub const MESSAGE_RECEIVED: &'static str = "message-received";
    pub const POST_LIKED: &'static str = "post-liked";
    pub const POST_COMMENTED: &'static str = "post-commented";
    pub const NEW_FOLLOWER: &'static str = "new-follower";
}
