//! One realtime channel: a background task that keeps a gateway connection
//! joined for a single identity and routes pushes to its handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use pawsitive_common::gateway::{
    OP_DISPATCH, OP_HEARTBEAT_ACK, OP_RECONNECT, TOPIC_NOTIFICATIONS,
};
use pawsitive_common::id::prefix;
use pawsitive_common::{ClientMessage, GatewayMessage, PrefixedId};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use super::events::{EventKind, RealtimeEvent};
use super::handlers::HandlerTable;
use super::transport::{self, classify_close, Disconnect, RetryPolicy, WsStream};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Collects handlers before the connection task exists, so no event can
/// arrive ahead of its subscriber.
pub struct ChannelBuilder {
    url: String,
    user_id: String,
    retry: RetryPolicy,
    heartbeat: Duration,
    handlers: HandlerTable,
}

impl ChannelBuilder {
    pub fn new(url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_id: user_id.into(),
            retry: RetryPolicy::default(),
            heartbeat: Duration::from_secs(25),
            handlers: HandlerTable::new(),
        }
    }

    pub fn from_config(config: &Config, user_id: impl Into<String>) -> Self {
        Self::new(config.gateway_url.clone(), user_id)
            .retry(RetryPolicy::from_config(config))
            .heartbeat(config.heartbeat_interval)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.handlers.on(kind, Arc::new(handler));
        self
    }

    pub fn on_any<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.handlers.on_any(Arc::new(handler));
        self
    }

    /// Start the connection task. Must be called inside a tokio runtime.
    pub fn spawn(self) -> RealtimeChannel {
        let id = RealtimeChannel::generate();
        let closed = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let worker = Worker {
            channel_id: id.clone(),
            url: self.url,
            user_id: self.user_id.clone(),
            retry: self.retry,
            heartbeat: self.heartbeat,
            handlers: self.handlers,
            closed: closed.clone(),
            state: state_tx,
            shutdown: shutdown_rx,
        };
        tracing::info!(channel_id = %id, user_id = %self.user_id, "realtime channel starting");
        let task = tokio::spawn(worker.run());

        RealtimeChannel {
            id,
            user_id: self.user_id,
            closed,
            shutdown: shutdown_tx,
            state: state_rx,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Handle to a running channel. Dropping it tears the channel down.
pub struct RealtimeChannel {
    id: String,
    user_id: String,
    closed: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<ConnectionState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PrefixedId for RealtimeChannel {
    const PREFIX: &'static str = prefix::CHANNEL;
}

impl RealtimeChannel {
    pub fn builder(url: impl Into<String>, user_id: impl Into<String>) -> ChannelBuilder {
        ChannelBuilder::new(url, user_id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Begin teardown. No handler starts after this returns.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(channel_id = %self.id, user_id = %self.user_id, "realtime channel closing");
        self.shutdown.send_replace(true);
    }

    /// Close and wait for the connection task to finish.
    pub async fn shutdown(&self) {
        self.close();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(channel_id = %self.id, error = %e, "realtime task ended abnormally");
            }
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.close();
    }
}

type WsSink = SplitSink<WsStream, Message>;

/// Floor for the heartbeat period; `interval` rejects zero.
const MIN_HEARTBEAT: Duration = Duration::from_millis(100);

/// Resolves once teardown is requested. The `watch::Ref` is dropped before
/// returning, so select arms may await afterwards.
async fn stop_signal(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

struct Worker {
    channel_id: String,
    url: String,
    user_id: String,
    retry: RetryPolicy,
    heartbeat: Duration,
    handlers: HandlerTable,
    closed: Arc<AtomicBool>,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    fn stopping(&self) -> bool {
        self.closed.load(Ordering::Acquire) || *self.shutdown.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                tracing::debug!(channel_id = %self.channel_id, from = ?*current, to = ?next, "connection state");
                *current = next;
                true
            }
        });
    }

    async fn run(self) {
        let mut attempt: u32 = 0;

        loop {
            if self.stopping() {
                break;
            }

            let mut shutdown = self.shutdown.clone();
            let connected = tokio::select! {
                _ = stop_signal(&mut shutdown) => break,
                result = transport::connect(&self.url) => result,
            };

            match connected {
                Ok(ws) => match self.drive(ws, &mut attempt).await {
                    Disconnect::Terminal(reason) => {
                        tracing::info!(channel_id = %self.channel_id, %reason, "realtime channel closed");
                        break;
                    }
                    Disconnect::Retry(reason) => {
                        tracing::warn!(channel_id = %self.channel_id, %reason, "realtime connection dropped");
                    }
                },
                Err(e) => {
                    tracing::warn!(channel_id = %self.channel_id, attempt, error = %e, "realtime connect failed");
                }
            }

            if self.stopping() {
                break;
            }
            if self.retry.exhausted(attempt) {
                tracing::warn!(channel_id = %self.channel_id, attempt, "giving up on realtime reconnect");
                break;
            }

            self.set_state(ConnectionState::Reconnecting);
            let delay = self.retry.delay(attempt);
            attempt += 1;
            tracing::info!(channel_id = %self.channel_id, attempt, delay_ms = delay.as_millis() as u64, "reconnecting");

            let mut shutdown = self.shutdown.clone();
            tokio::select! {
                _ = stop_signal(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        // Handlers go away with the task.
        drop(self.handlers);
    }

    /// Join, then pump frames until the connection ends.
    async fn drive(&self, ws: WsStream, attempt: &mut u32) -> Disconnect {
        let (mut sink, mut stream) = ws.split();

        let join = ClientMessage::join(&self.user_id);
        let subscribe = ClientMessage::subscribe(&[TOPIC_NOTIFICATIONS]);
        for msg in [&join, &subscribe] {
            if let Err(reason) = send(&mut sink, msg).await {
                return Disconnect::Retry(reason);
            }
        }
        *attempt = 0;
        self.set_state(ConnectionState::Connected);
        tracing::info!(channel_id = %self.channel_id, user_id = %self.user_id, "realtime channel joined");

        let mut last_seq: u64 = 0;
        let period = self.heartbeat.max(MIN_HEARTBEAT);
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = stop_signal(&mut shutdown) => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        })))
                        .await;
                    return Disconnect::Terminal("teardown".into());
                }

                _ = heartbeat.tick() => {
                    if let Err(reason) = send(&mut sink, &ClientMessage::heartbeat(last_seq)).await {
                        return Disconnect::Retry(reason);
                    }
                }

                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<GatewayMessage>(text.as_str()) {
                            Ok(msg) if msg.op == OP_DISPATCH => self.on_dispatch(msg, &mut last_seq),
                            Ok(msg) if msg.op == OP_RECONNECT => {
                                return Disconnect::Retry("server requested reconnect".into());
                            }
                            Ok(msg) if msg.op == OP_HEARTBEAT_ACK => {
                                tracing::trace!(channel_id = %self.channel_id, "heartbeat ack");
                            }
                            Ok(msg) => {
                                tracing::debug!(channel_id = %self.channel_id, op = msg.op, "ignoring opcode");
                            }
                            Err(e) => {
                                tracing::warn!(channel_id = %self.channel_id, error = %e, "unparsable gateway frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => return classify_close(frame.as_ref()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Disconnect::Retry(format!("read error: {e}")),
                    None => return Disconnect::Retry("stream ended".into()),
                },
            }
        }
    }

    fn on_dispatch(&self, msg: GatewayMessage, last_seq: &mut u64) {
        if let Some(seq) = msg.s {
            if seq <= *last_seq {
                tracing::debug!(channel_id = %self.channel_id, seq, last_seq = *last_seq, "duplicate dispatch dropped");
                return;
            }
            *last_seq = seq;
        }

        let Some(name) = msg.t else {
            tracing::warn!(channel_id = %self.channel_id, "dispatch without event name");
            return;
        };
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        match RealtimeEvent::parse(&name, msg.d) {
            Ok(event) => {
                let ran = self.handlers.dispatch(&event, &self.closed);
                tracing::debug!(channel_id = %self.channel_id, event = %name, handlers = ran, "dispatched");
            }
            Err(e) => {
                tracing::warn!(channel_id = %self.channel_id, error = %e, "ignoring push");
            }
        }
    }
}

async fn send(sink: &mut WsSink, msg: &ClientMessage) -> Result<(), String> {
    let text = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| format!("write error: {e}"))
}
