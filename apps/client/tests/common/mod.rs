#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use pawsitive_client::auth::MemoryTokenStore;
use pawsitive_client::config::Config;
use pawsitive_client::App;
use pawsitive_common::gateway::{OP_HEARTBEAT, OP_JOIN, OP_SUBSCRIBE};
use pawsitive_common::{ClientMessage, GatewayMessage};

pub const PASSWORD: &str = "secret1";
const SECRET: &[u8] = b"test-secret";

/// Commands the test sends to one server-side socket.
#[derive(Debug)]
pub enum WsCommand {
    Frame(String),
    /// Close with this status code.
    Close(u16),
    /// Drop the TCP connection without a close frame.
    Drop,
}

/// In-memory stand-in for the REST API and the gateway.
#[derive(Default)]
pub struct Backend {
    pub users: Mutex<Vec<Value>>,
    /// Accepted bearer tokens → user id.
    pub tokens: Mutex<HashMap<String, String>>,
    pub embed_user_on_login: AtomicBool,
    pub fail_profile: AtomicBool,
    pub requests: Mutex<Vec<String>>,
    pub logouts: AtomicUsize,

    pub notifications: Mutex<Vec<Value>>,
    pub fail_mark_read: AtomicBool,
    pub fail_delete: AtomicBool,

    pub likes: Mutex<HashMap<String, (bool, u64)>>,
    pub fail_like: AtomicBool,
    pub like_delay_ms: AtomicU64,

    /// Follow state per followed user: (viewer follows, follower count).
    pub follows: Mutex<HashMap<String, (bool, u64)>>,
    pub fail_follow: AtomicBool,
    pub fail_delete_comment: AtomicBool,

    pub joins: Mutex<Vec<String>>,
    pub subscribes: Mutex<Vec<Vec<String>>>,
    pub heartbeats: AtomicUsize,
    pub connections: AtomicUsize,
    sockets: Mutex<Vec<mpsc::UnboundedSender<WsCommand>>>,
}

impl Backend {
    fn hit(&self, what: impl Into<String>) {
        self.requests.lock().push(what.into());
    }

    pub fn hits(&self, what: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.as_str() == what).count()
    }

    pub fn user(&self, user_id: &str) -> Option<Value> {
        self.users.lock().iter().find(|u| u["_id"] == user_id).cloned()
    }

    /// Mint a token for `user_id` that the server accepts.
    pub fn issue(&self, user_id: &str) -> String {
        let username = self
            .user(user_id)
            .and_then(|u| u["username"].as_str().map(str::to_string))
            .unwrap_or_default();
        let token = mint_token(user_id, &username, chrono::Duration::hours(1));
        self.tokens.lock().insert(token.clone(), user_id.to_string());
        token
    }

    pub fn revoke_all(&self) {
        self.tokens.lock().clear();
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<String, Response> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or_default();
        self.tokens
            .lock()
            .get(token)
            .cloned()
            .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }

    pub fn live_sockets(&self) -> usize {
        self.sockets.lock().iter().filter(|s| !s.is_closed()).count()
    }

    fn send_all(&self, mut make: impl FnMut() -> WsCommand) {
        self.sockets.lock().retain(|s| s.send(make()).is_ok());
    }

    /// Dispatch an event to every connected socket.
    pub fn push(&self, event: &str, seq: u64, data: Value) {
        let text = serde_json::to_string(&GatewayMessage::dispatch(event, seq, data)).unwrap();
        self.send_all(|| WsCommand::Frame(text.clone()));
    }

    pub fn request_reconnect(&self) {
        let text = serde_json::to_string(&GatewayMessage::reconnect("restart")).unwrap();
        self.send_all(|| WsCommand::Frame(text.clone()));
    }

    pub fn close_sockets(&self, code: u16) {
        self.send_all(|| WsCommand::Close(code));
    }

    pub fn drop_sockets(&self) {
        self.send_all(|| WsCommand::Drop);
    }

    pub fn unread(&self) -> usize {
        self.notifications.lock().iter().filter(|n| n["read"] == false).count()
    }
}

pub fn mint_token(user_id: &str, username: &str, ttl: chrono::Duration) -> String {
    let claims = json!({
        "_id": user_id,
        "username": username,
        "exp": (Utc::now() + ttl).timestamp(),
    });
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

pub fn user_json(id: &str, username: &str) -> Value {
    json!({
        "_id": id,
        "username": username,
        "email": format!("{username}@example.com"),
        "name": format!("{username} the dog"),
        "followersCount": 0,
        "followingCount": 0,
    })
}

pub fn sender_json(id: &str, username: &str) -> Value {
    json!({ "_id": id, "username": username })
}

pub fn notification_json(id: &str, kind: &str, sender_id: &str, read: bool, minutes_ago: i64) -> Value {
    json!({
        "_id": id,
        "type": kind,
        "sender": sender_json(sender_id, "someone"),
        "post": "p1",
        "read": read,
        "createdAt": (Utc::now() - chrono::Duration::minutes(minutes_ago)).to_rfc3339(),
    })
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

// ---------------------------------------------------------------------------
// REST handlers
// ---------------------------------------------------------------------------

async fn login(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    b.hit("POST /user/login");
    let email = body["email"].as_str().unwrap_or_default();
    let user = b.users.lock().iter().find(|u| u["email"] == email).cloned();
    match user {
        Some(user) if body["password"] == PASSWORD => {
            let token = b.issue(user["_id"].as_str().unwrap_or_default());
            if b.embed_user_on_login.load(Ordering::SeqCst) {
                Json(json!({ "token": token, "user": user })).into_response()
            } else {
                Json(json!({ "token": token })).into_response()
            }
        }
        _ => error(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

async fn logout(State(b): State<Arc<Backend>>) -> Response {
    b.hit("POST /user/logout");
    b.logouts.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "message": "ok" })).into_response()
}

async fn register(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    b.hit("POST /user/register");
    let username = body["username"].as_str().unwrap_or_default().to_string();
    if b.users.lock().iter().any(|u| u["username"] == username.as_str()) {
        return error(StatusCode::BAD_REQUEST, "Username already taken");
    }
    let id = format!("u{}", b.users.lock().len() + 1);
    b.users.lock().push(user_json(&id, &username));
    (StatusCode::CREATED, Json(json!({ "message": "created" }))).into_response()
}

async fn user_by_id(State(b): State<Arc<Backend>>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    b.hit(format!("GET /user/{id}"));
    if let Err(r) = b.authorize(&headers) {
        return r;
    }
    if b.fail_profile.load(Ordering::SeqCst) {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Profile service down");
    }
    match b.user(&id) {
        Some(user) => Json(user).into_response(),
        None => error(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn search_users(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    b.hit("GET /user/search");
    if let Err(r) = b.authorize(&headers) {
        return r;
    }
    let term = q.get("q").cloned().unwrap_or_default();
    let found: Vec<Value> = b
        .users
        .lock()
        .iter()
        .filter(|u| u["username"].as_str().is_some_and(|n| n.contains(&term)))
        .cloned()
        .collect();
    Json(found).into_response()
}

async fn like(State(b): State<Arc<Backend>>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    b.hit(format!("POST /like/{id}"));
    if let Err(r) = b.authorize(&headers) {
        return r;
    }
    let delay = b.like_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if b.fail_like.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Like failed");
    }
    let mut likes = b.likes.lock();
    let entry = likes.entry(id).or_insert((false, 4));
    if entry.0 {
        *entry = (false, entry.1 - 1);
    } else {
        *entry = (true, entry.1 + 1);
    }
    Json(json!({ "likes": entry.1, "isLiked": entry.0 })).into_response()
}

fn set_follow(b: &Backend, headers: &HeaderMap, id: String, follow: bool) -> Response {
    b.hit(format!("POST /user/{}/{id}", if follow { "follow" } else { "unfollow" }));
    if let Err(r) = b.authorize(headers) {
        return r;
    }
    if b.fail_follow.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Follow failed");
    }
    let mut follows = b.follows.lock();
    let entry = follows.entry(id).or_insert((false, 3));
    if entry.0 != follow {
        *entry = if follow { (true, entry.1 + 1) } else { (false, entry.1 - 1) };
    }
    Json(json!({ "followersCount": entry.1, "isFollowing": entry.0 })).into_response()
}

async fn follow(State(b): State<Arc<Backend>>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    set_follow(&b, &headers, id, true)
}

async fn unfollow(State(b): State<Arc<Backend>>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    set_follow(&b, &headers, id, false)
}

async fn delete_comment(State(b): State<Arc<Backend>>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    b.hit(format!("DELETE /comment/{id}"));
    if let Err(r) = b.authorize(&headers) {
        return r;
    }
    if b.fail_delete_comment.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Could not delete comment");
    }
    Json(json!({ "message": "ok" })).into_response()
}

async fn create_comment(State(b): State<Arc<Backend>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    b.hit("POST /comment");
    let user_id = match b.authorize(&headers) {
        Ok(id) => id,
        Err(r) => return r,
    };
    let n = b.requests.lock().len();
    Json(json!({
        "_id": format!("c{n}"),
        "user": { "_id": user_id, "username": "daisy" },
        "text": body["text"],
        "post": body["postId"],
        "createdAt": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

async fn list_notifications(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    b.hit("GET /notification");
    if let Err(r) = b.authorize(&headers) {
        return r;
    }
    let notifications = b.notifications.lock().clone();
    let unread = b.unread();
    Json(json!({ "notifications": notifications, "unreadCount": unread })).into_response()
}

async fn mark_read(State(b): State<Arc<Backend>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    b.hit("PUT /notification/read");
    if let Err(r) = b.authorize(&headers) {
        return r;
    }
    if b.fail_mark_read.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Could not mark notifications");
    }
    let ids: HashSet<String> = serde_json::from_value(body["notificationIds"].clone()).unwrap_or_default();
    for n in b.notifications.lock().iter_mut() {
        if n["_id"].as_str().is_some_and(|id| ids.contains(id)) {
            n["read"] = Value::Bool(true);
        }
    }
    Json(json!({ "message": "ok" })).into_response()
}

async fn delete_notifications(State(b): State<Arc<Backend>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    b.hit("DELETE /notification");
    if let Err(r) = b.authorize(&headers) {
        return r;
    }
    if b.fail_delete.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Could not delete notifications");
    }
    match serde_json::from_value::<Option<HashSet<String>>>(body["notificationIds"].clone()) {
        Ok(Some(ids)) => b
            .notifications
            .lock()
            .retain(|n| !n["_id"].as_str().is_some_and(|id| ids.contains(id))),
        _ => b.notifications.lock().clear(),
    }
    Json(json!({ "message": "ok" })).into_response()
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

async fn gateway(ws: WebSocketUpgrade, State(b): State<Arc<Backend>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, b))
}

async fn handle_socket(socket: WebSocket, b: Arc<Backend>) {
    let (mut tx, mut rx) = socket.split();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    b.sockets.lock().push(cmd_tx);
    b.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(WsCommand::Frame(text)) => {
                    if tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(WsCommand::Close(code)) => {
                    let _ = tx
                        .send(Message::Close(Some(CloseFrame { code, reason: "bye".into() })))
                        .await;
                    break;
                }
                Some(WsCommand::Drop) | None => break,
            },
            msg = rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Ok(msg) = serde_json::from_str::<ClientMessage>(text.as_str()) else {
                        continue;
                    };
                    match msg.op {
                        OP_JOIN => {
                            let user_id = msg.d["userId"].as_str().unwrap_or_default().to_string();
                            b.joins.lock().push(user_id);
                        }
                        OP_SUBSCRIBE => {
                            let topics = serde_json::from_value(msg.d["topics"].clone()).unwrap_or_default();
                            b.subscribes.lock().push(topics);
                        }
                        OP_HEARTBEAT => {
                            b.heartbeats.fetch_add(1, Ordering::SeqCst);
                            let ack = serde_json::to_string(&GatewayMessage::heartbeat_ack(0)).unwrap();
                            let _ = tx.send(Message::Text(ack.into())).await;
                        }
                        _ => {}
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct TestServer {
    pub addr: SocketAddr,
    pub backend: Arc<Backend>,
}

impl TestServer {
    pub fn config(&self) -> Config {
        let mut config = Config::new(format!("http://{}", self.addr));
        config.reconnect_delay = Duration::from_millis(20);
        config.max_reconnect_delay = Duration::from_millis(100);
        config.heartbeat_interval = Duration::from_secs(30);
        config.request_timeout = Duration::from_secs(5);
        config
    }

    /// An app with an in-memory token store, not yet started.
    pub fn app(&self) -> App {
        App::with_store(self.config(), Arc::new(MemoryTokenStore::new())).expect("build app")
    }
}

/// Start the fake backend on an ephemeral port with users `u1` (daisy) and
/// `u2` (rex).
pub async fn start_server() -> TestServer {
    let backend = Arc::new(Backend::default());
    backend.users.lock().push(user_json("u1", "daisy"));
    backend.users.lock().push(user_json("u2", "rex"));

    let app = Router::new()
        .route("/user/login", post(login))
        .route("/user/logout", post(logout))
        .route("/user/register", post(register))
        .route("/user/search", get(search_users))
        .route("/user/follow/{id}", post(follow))
        .route("/user/unfollow/{id}", post(unfollow))
        .route("/user/{id}", get(user_by_id))
        .route("/like/{id}", post(like))
        .route("/comment", post(create_comment))
        .route("/comment/{id}", delete(delete_comment))
        .route("/notification", get(list_notifications).delete(delete_notifications))
        .route("/notification/read", put(mark_read))
        .route("/gateway", get(gateway))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer { addr, backend }
}

/// Poll `check` until it holds, failing the test after five seconds.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
