//! Debounced search-as-you-type.
//!
//! One request per pause in typing: each keystroke cancels the previously
//! scheduled search, and queries shorter than [`MIN_QUERY_CHARS`] never hit
//! the network.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::{Message, User};
use crate::view::ScopeHandle;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchState<T> {
    Idle,
    Pending(String),
    Ready { query: String, results: Vec<T> },
    Failed { query: String, message: String },
}

impl<T> SearchState<T> {
    pub fn results(&self) -> &[T] {
        match self {
            Self::Ready { results, .. } => results,
            _ => &[],
        }
    }
}

type SearchFn<T> = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Vec<T>, ClientError>> + Send + Sync>;

pub struct SearchBox<T> {
    search: SearchFn<T>,
    scope: ScopeHandle,
    delay: Duration,
    state: Arc<watch::Sender<SearchState<T>>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T> SearchBox<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F>(scope: ScopeHandle, search: F) -> Self
    where
        F: Fn(String) -> BoxFuture<'static, Result<Vec<T>, ClientError>> + Send + Sync + 'static,
    {
        let (state, _) = watch::channel(SearchState::Idle);
        Self {
            search: Arc::new(search),
            scope,
            delay: SEARCH_DEBOUNCE,
            state: Arc::new(state),
            pending: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn state(&self) -> SearchState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState<T>> {
        self.state.subscribe()
    }

    /// Feed the current contents of the search field. Must be called inside
    /// a tokio runtime.
    pub fn input(&self, text: &str) {
        let query = text.trim().to_string();
        let mut pending = self.pending.lock();
        if let Some(prior) = pending.take() {
            prior.abort();
        }

        if query.chars().count() < MIN_QUERY_CHARS {
            self.state.send_replace(SearchState::Idle);
            return;
        }

        self.state.send_replace(SearchState::Pending(query.clone()));
        let search = self.search.clone();
        let scope = self.scope.clone();
        let state = self.state.clone();
        let delay = self.delay;

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!(%query, "searching");
            let Some(outcome) = scope.guard(search(query.clone())).await else {
                return;
            };
            let next = match outcome {
                Ok(results) => SearchState::Ready { query, results },
                Err(e) => {
                    tracing::warn!(error = %e, "search failed");
                    SearchState::Failed {
                        query,
                        message: e.user_message(),
                    }
                }
            };
            state.send_replace(next);
        }));
    }

    /// Drop whatever is scheduled and go idle.
    pub fn clear(&self) {
        if let Some(prior) = self.pending.lock().take() {
            prior.abort();
        }
        self.state.send_replace(SearchState::Idle);
    }
}

impl<T> Drop for SearchBox<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.get_mut().take() {
            pending.abort();
        }
    }
}

impl SearchBox<User> {
    pub fn users(api: ApiClient, scope: ScopeHandle) -> Self {
        Self::new(scope, move |term| {
            let api = api.clone();
            Box::pin(async move { api.search_users(&term).await })
        })
    }
}

impl SearchBox<Message> {
    /// Search inside one conversation.
    pub fn messages(api: ApiClient, conversation_id: impl Into<String>, scope: ScopeHandle) -> Self {
        let conversation_id = conversation_id.into();
        Self::new(scope, move |term| {
            let api = api.clone();
            let conversation_id = conversation_id.clone();
            Box::pin(async move { api.search_messages(&conversation_id, &term).await })
        })
    }
}
