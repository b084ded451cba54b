//! Notification list, unread badge, and alerts for pushed events.

use tokio::sync::watch;

use super::alerts::{Alert, AlertCenter};
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::{NotificationEvent, Route};
use crate::realtime::RealtimeEvent;
use crate::session::SessionStore;

/// What the notifications view renders. `unread_count` comes from the
/// server and is what the badge shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationSnapshot {
    pub notifications: Vec<NotificationEvent>,
    pub unread_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadTarget {
    Ids(Vec<String>),
    AllUnread,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Ids(Vec<String>),
    All,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    api: ApiClient,
    sessions: SessionStore,
    alerts: AlertCenter,
    state: watch::Sender<NotificationSnapshot>,
}

impl NotificationDispatcher {
    pub fn new(api: ApiClient, sessions: SessionStore, alerts: AlertCenter) -> Self {
        let (state, _) = watch::channel(NotificationSnapshot::default());
        Self {
            api,
            sessions,
            alerts,
            state,
        }
    }

    pub fn alerts(&self) -> &AlertCenter {
        &self.alerts
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        self.state.borrow().clone()
    }

    pub fn unread_count(&self) -> u64 {
        self.state.borrow().unread_count
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationSnapshot> {
        self.state.subscribe()
    }

    /// Raise an alert for a pushed event. Events sent by the current user,
    /// or arriving with no session, are suppressed. Returns the alert id.
    pub fn on_push<F>(&self, event: &RealtimeEvent, on_activate: F) -> Option<String>
    where
        F: FnOnce(Route) + Send + 'static,
    {
        let session = self.sessions.current()?;
        let sender = event.sender();
        if sender.id == session.user_id {
            tracing::debug!(kind = ?event.kind(), "suppressing own event");
            return None;
        }

        let text = match event {
            RealtimeEvent::MessageReceived(m) => Some(m.content.as_str()),
            RealtimeEvent::PostCommented(a) => a.text.as_deref(),
            RealtimeEvent::PostLiked(_) | RealtimeEvent::NewFollower(_) => None,
        };
        let alert = Alert::new(event.kind().notification_kind(), sender, event.route(), text);
        Some(self.alerts.show(alert, on_activate))
    }

    /// Replace the list and badge with the server's view.
    pub async fn fetch_all(&self) -> Result<NotificationSnapshot, ClientError> {
        let list = self.sessions.check(self.api.notifications().await).await?;
        let mut notifications = list.notifications;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let snapshot = NotificationSnapshot {
            notifications,
            unread_count: list.unread_count,
        };
        self.state.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    /// Flip `read` locally, then tell the server. On failure the local state
    /// is re-fetched rather than rolled back.
    pub async fn mark_read(&self, target: ReadTarget) -> Result<(), ClientError> {
        let current = self.snapshot();
        if current.unread_count == 0 {
            return Ok(());
        }

        let (ids, all) = match target {
            ReadTarget::AllUnread => (
                current
                    .notifications
                    .iter()
                    .filter(|n| !n.read)
                    .map(|n| n.id.clone())
                    .collect::<Vec<_>>(),
                true,
            ),
            ReadTarget::Ids(ids) => (ids, false),
        };
        if ids.is_empty() {
            return Ok(());
        }

        self.state.send_modify(|snap| {
            let mut flipped = 0;
            for n in snap.notifications.iter_mut().filter(|n| ids.contains(&n.id)) {
                if !n.read {
                    n.read = true;
                    flipped += 1;
                }
            }
            snap.unread_count = if all {
                0
            } else {
                snap.unread_count.saturating_sub(flipped)
            };
        });

        let result = self.api.mark_notifications_read(&ids).await;
        if let Err(e) = self.sessions.check(result).await {
            tracing::warn!(error = %e, count = ids.len(), "mark read failed, re-fetching");
            if let Err(refetch) = self.fetch_all().await {
                tracing::warn!(error = %refetch, "re-fetch after mark read failed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Delete on the server, then re-fetch. Nothing changes locally until
    /// the re-fetch lands.
    pub async fn delete(&self, target: DeleteTarget) -> Result<(), ClientError> {
        let result = match &target {
            DeleteTarget::Ids(ids) if ids.is_empty() => return Ok(()),
            DeleteTarget::Ids(ids) => self.api.delete_notifications(Some(ids.as_slice())).await,
            DeleteTarget::All => self.api.delete_notifications(None).await,
        };
        let result = self.sessions.check(result).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "delete notifications failed");
        }

        match (result, self.fetch_all().await) {
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(_)) => Ok(()),
        }
    }
}
