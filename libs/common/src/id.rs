//! Ids for objects that exist only on the client: toast alerts, realtime
//! channels and comments still waiting for the server.
//!
//! Server records keep the backend's `_id`. A locally minted id is
//! `<prefix>_<ulid>`, so it can never collide with a backend id and can be
//! recognised after it has been stored next to server records.

use ulid::Ulid;

pub mod prefix {
    pub const ALERT: &str = "alr";
    pub const CHANNEL: &str = "rtc";
    pub const PENDING_COMMENT: &str = "tmp";
}

pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{prefix}_{}", Ulid::new())
}

/// The prefix of a locally minted id, or `None` for anything the backend
/// could have issued.
pub fn local_prefix(id: &str) -> Option<&str> {
    let (prefix, rest) = id.split_once('_')?;
    Ulid::from_string(rest).ok()?;
    Some(prefix)
}

/// A comment shown optimistically that the server has not confirmed yet.
pub fn is_pending_comment(id: &str) -> bool {
    local_prefix(id) == Some(prefix::PENDING_COMMENT)
}

pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }

    /// Whether `id` was minted by [`PrefixedId::generate`] for this type.
    fn owns(id: &str) -> bool {
        local_prefix(id) == Some(Self::PREFIX)
    }
}
