pub mod actions;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod optimistic;
pub mod realtime;
pub mod search;
pub mod session;
pub mod validation;
pub mod view;

use std::sync::Arc;

use api::ApiClient;
use auth::{Credentials, FileTokenStore, MemoryTokenStore, TokenStore};
use config::Config;
use error::ClientError;
use models::Route;
use notify::{AlertCenter, NotificationDispatcher};
use parking_lot::Mutex;
use realtime::{ChannelBuilder, ChannelRegistry, RealtimeSupervisor};
use session::{Session, SessionStore};
use tokio::sync::broadcast;

/// Top-level client state shared by every view.
#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub api: ApiClient,
    pub sessions: SessionStore,
    pub notifications: NotificationDispatcher,
    pub alerts: AlertCenter,
    pub channels: ChannelRegistry,
    navigation: broadcast::Sender<Route>,
    supervisor: Arc<Mutex<Option<Arc<RealtimeSupervisor>>>>,
}

impl App {
    /// Persist the token to `config.token_path` when set, otherwise keep it
    /// in memory.
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let store: Arc<dyn TokenStore> = match &config.token_path {
            Some(path) => Arc::new(FileTokenStore::new(path)),
            None => Arc::new(MemoryTokenStore::new()),
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let api = ApiClient::new(&config, Credentials::new())?;
        let sessions = SessionStore::new(api.clone(), store);
        let alerts = AlertCenter::new();
        let notifications = NotificationDispatcher::new(api.clone(), sessions.clone(), alerts.clone());
        let (navigation, _) = broadcast::channel(16);

        Ok(Self {
            config: Arc::new(config),
            api,
            sessions,
            notifications,
            alerts,
            channels: ChannelRegistry::new(),
            navigation,
            supervisor: Arc::new(Mutex::new(None)),
        })
    }

    /// Routes requested by activating an alert.
    pub fn navigation(&self) -> broadcast::Receiver<Route> {
        self.navigation.subscribe()
    }

    /// Resume the persisted session and bind the realtime channel to it.
    /// Idempotent.
    pub async fn start(&self) -> Result<Option<Session>, ClientError> {
        let resumed = self.sessions.resume().await?;

        let mut slot = self.supervisor.lock();
        if slot.is_none() {
            let config = self.config.clone();
            let notifications = self.notifications.clone();
            let navigation = self.navigation.clone();

            let supervisor = RealtimeSupervisor::spawn(
                self.sessions.subscribe(),
                self.channels.clone(),
                move |session: &Session| {
                    let notifications = notifications.clone();
                    let navigation = navigation.clone();
                    ChannelBuilder::from_config(&config, session.user_id.clone()).on_any(move |event| {
                        let navigation = navigation.clone();
                        let raised = notifications.on_push(event, move |route| {
                            let _ = navigation.send(route);
                        });
                        if raised.is_some() {
                            let notifications = notifications.clone();
                            tokio::spawn(async move {
                                if let Err(e) = notifications.fetch_all().await {
                                    tracing::debug!(error = %e, "badge refresh after push failed");
                                }
                            });
                        }
                    })
                },
            );
            *slot = Some(Arc::new(supervisor));
        }

        Ok(resumed)
    }

    /// The realtime supervisor, once [`App::start`] has run.
    pub fn realtime(&self) -> Option<Arc<RealtimeSupervisor>> {
        self.supervisor.lock().clone()
    }

    /// Tear down the realtime channel. The session itself is kept.
    pub async fn shutdown(&self) {
        let supervisor = self.supervisor.lock().take();
        if let Some(supervisor) = supervisor {
            supervisor.shutdown().await;
        }
        self.channels.close_all().await;
        tracing::info!("client shut down");
    }
}
