//! Process-wide registry of live realtime channels, one per identity.

use std::sync::Arc;

use dashmap::DashMap;

use super::channel::{ChannelBuilder, RealtimeChannel};

/// Uses `DashMap` so lookups from handlers never contend with an open or
/// close in progress for another identity.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: Arc<DashMap<String, Arc<RealtimeChannel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a channel for the builder's identity, tearing down any prior
    /// instance for that identity first.
    pub async fn open(&self, builder: ChannelBuilder) -> Arc<RealtimeChannel> {
        let user_id = builder.user_id().to_string();
        if let Some((_, prior)) = self.channels.remove(&user_id) {
            tracing::info!(%user_id, channel_id = %prior.id(), "replacing realtime channel");
            prior.shutdown().await;
        }

        let channel = Arc::new(builder.spawn());
        // A concurrent open for the same identity may have landed meanwhile.
        if let Some(raced) = self.channels.insert(user_id, channel.clone()) {
            raced.shutdown().await;
        }
        channel
    }

    pub fn get(&self, user_id: &str) -> Option<Arc<RealtimeChannel>> {
        self.channels.get(user_id).map(|entry| entry.value().clone())
    }

    /// Tear down and forget the channel for `user_id`. Returns whether one
    /// existed.
    pub async fn close(&self, user_id: &str) -> bool {
        match self.channels.remove(user_id) {
            Some((_, channel)) => {
                channel.shutdown().await;
                true
            }
            None => false,
        }
    }

    pub async fn close_all(&self) {
        let ids: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        for user_id in ids {
            self.close(&user_id).await;
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::channel::ConnectionState;
    use crate::realtime::transport::RetryPolicy;
    use std::time::Duration;

    fn builder(user_id: &str) -> ChannelBuilder {
        // Nothing listens on port 9; the channel just keeps retrying.
        ChannelBuilder::new("ws://127.0.0.1:9/gateway", user_id).retry(RetryPolicy {
            base: Duration::from_millis(50),
            max: Duration::from_millis(50),
            max_attempts: None,
            jitter: 0.0,
        })
    }

    #[tokio::test]
    async fn reopening_an_identity_closes_the_prior_instance() {
        let registry = ChannelRegistry::new();
        let first = registry.open(builder("u1")).await;
        let second = registry.open(builder("u1")).await;

        assert!(first.is_closed());
        assert!(!second.is_closed());
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.len(), 1);
        assert_eq!(first.state(), ConnectionState::Disconnected);

        registry.close_all().await;
    }

    #[tokio::test]
    async fn identities_are_independent() {
        let registry = ChannelRegistry::new();
        let a = registry.open(builder("u1")).await;
        let b = registry.open(builder("u2")).await;
        assert_eq!(registry.len(), 2);

        assert!(registry.close("u1").await);
        assert!(a.is_closed());
        assert!(!b.is_closed());
        assert!(!registry.close("u1").await);

        registry.close_all().await;
        assert!(registry.is_empty());
        assert!(b.is_closed());
    }
}
