//! Binds the realtime channel lifetime to the session.
//!
//! Opens a channel when a session appears, tears it down when the session
//! goes away, and rebinds when the identity changes.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::channel::{ChannelBuilder, RealtimeChannel};
use super::registry::ChannelRegistry;
use crate::session::Session;

pub struct RealtimeSupervisor {
    current: Arc<Mutex<Option<Arc<RealtimeChannel>>>>,
    stop: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeSupervisor {
    /// `make` builds the channel (with its handlers) for a new session.
    pub fn spawn<F>(
        mut sessions: watch::Receiver<Option<Session>>,
        registry: ChannelRegistry,
        make: F,
    ) -> Self
    where
        F: Fn(&Session) -> ChannelBuilder + Send + Sync + 'static,
    {
        let current: Arc<Mutex<Option<Arc<RealtimeChannel>>>> = Arc::new(Mutex::new(None));
        let (stop, mut stop_rx) = watch::channel(false);

        let slot = current.clone();
        let task = tokio::spawn(async move {
            let mut bound: Option<String> = None;

            loop {
                let session = sessions.borrow_and_update().clone();
                match session {
                    Some(session) if bound.as_deref() == Some(session.user_id.as_str()) => {}
                    Some(session) => {
                        if let Some(prior) = bound.take() {
                            registry.close(&prior).await;
                        }
                        let channel = registry.open(make(&session)).await;
                        *slot.lock() = Some(channel);
                        bound = Some(session.user_id);
                    }
                    None => {
                        if let Some(prior) = bound.take() {
                            slot.lock().take();
                            registry.close(&prior).await;
                            tracing::info!(user_id = %prior, "session ended, realtime channel torn down");
                        }
                    }
                }

                tokio::select! {
                    changed = sessions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = stop_rx.wait_for(|stop| *stop) => break,
                }
            }

            slot.lock().take();
            if let Some(prior) = bound {
                registry.close(&prior).await;
            }
        });

        Self {
            current,
            stop,
            task: Mutex::new(Some(task)),
        }
    }

    /// The channel for the current session, if any.
    pub fn current(&self) -> Option<Arc<RealtimeChannel>> {
        self.current.lock().clone()
    }

    /// Stop following the session and tear down the bound channel.
    pub async fn shutdown(&self) {
        self.stop.send_replace(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "realtime supervisor ended abnormally");
            }
        }
    }
}
