//! Transient alerts ("toasts") raised for pushed events.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use pawsitive_common::id::prefix;
use pawsitive_common::PrefixedId;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::models::{NotificationKind, Route, UserRef};

pub const MESSAGE_ALERT_DURATION: Duration = Duration::from_millis(4000);
pub const ACTIVITY_ALERT_DURATION: Duration = Duration::from_millis(5000);

const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub avatar: Option<String>,
    pub route: Route,
    pub duration: Duration,
    pub raised_at: DateTime<Utc>,
}

impl PrefixedId for Alert {
    const PREFIX: &'static str = prefix::ALERT;
}

impl Alert {
    pub fn new(kind: NotificationKind, sender: &UserRef, route: Route, message: Option<&str>) -> Self {
        let (title, body, duration) = match kind {
            NotificationKind::Message => (
                sender.username.clone(),
                preview(message.unwrap_or_default()),
                MESSAGE_ALERT_DURATION,
            ),
            NotificationKind::Like => (
                format!("{} liked your post", sender.username),
                String::new(),
                ACTIVITY_ALERT_DURATION,
            ),
            NotificationKind::Comment => (
                format!("{} commented on your post", sender.username),
                message.map(preview).unwrap_or_default(),
                ACTIVITY_ALERT_DURATION,
            ),
            NotificationKind::Follow => (
                format!("{} started following you", sender.username),
                String::new(),
                ACTIVITY_ALERT_DURATION,
            ),
        };
        Self {
            id: Self::generate(),
            kind,
            title,
            body,
            avatar: sender.profile_picture.clone(),
            route,
            duration,
            raised_at: Utc::now(),
        }
    }
}

fn preview(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(PREVIEW_CHARS - 1).collect();
    out.push('…');
    out
}

type OnActivate = Box<dyn FnOnce(Route) + Send>;

struct Entry {
    alert: Alert,
    on_activate: Option<OnActivate>,
}

struct Inner {
    entries: Mutex<Vec<Entry>>,
    raised: broadcast::Sender<Alert>,
}

/// In-memory alert surface. Alerts expire on their own after their
/// duration; activating or dismissing an expired alert does nothing.
#[derive(Clone)]
pub struct AlertCenter {
    inner: Arc<Inner>,
}

impl Default for AlertCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertCenter {
    pub fn new() -> Self {
        let (raised, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                raised,
            }),
        }
    }

    /// Raise an alert and schedule its expiry. Must be called inside a tokio
    /// runtime.
    pub fn show<F>(&self, alert: Alert, on_activate: F) -> String
    where
        F: FnOnce(Route) + Send + 'static,
    {
        let id = alert.id.clone();
        let duration = alert.duration;
        tracing::debug!(alert_id = %id, kind = ?alert.kind, "alert raised");

        self.inner.entries.lock().push(Entry {
            alert: alert.clone(),
            on_activate: Some(Box::new(on_activate)),
        });
        let _ = self.inner.raised.send(alert);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let expiring = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = weak.upgrade() {
                if take(&inner, &expiring).is_some() {
                    tracing::trace!(alert_id = %expiring, "alert expired");
                }
            }
        });

        id
    }

    /// Run the alert's callback and remove it. Returns `false` if the alert
    /// already expired or was dismissed.
    pub fn activate(&self, id: &str) -> bool {
        let Some(entry) = take(&self.inner, id) else {
            return false;
        };
        if let Some(on_activate) = entry.on_activate {
            on_activate(entry.alert.route);
        }
        true
    }

    pub fn dismiss(&self, id: &str) -> bool {
        take(&self.inner, id).is_some()
    }

    pub fn active(&self) -> Vec<Alert> {
        self.inner.entries.lock().iter().map(|e| e.alert.clone()).collect()
    }

    /// Stream of alerts as they are raised.
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.inner.raised.subscribe()
    }
}

fn take(inner: &Inner, id: &str) -> Option<Entry> {
    let mut entries = inner.entries.lock();
    let idx = entries.iter().position(|e| e.alert.id == id)?;
    Some(entries.remove(idx))
}
