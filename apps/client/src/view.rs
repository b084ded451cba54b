//! Liveness of a mounted view.
//!
//! A view owns one [`ViewScope`]. Async continuations spawned on its behalf
//! hold a [`ScopeHandle`] and check it before touching view state, so a
//! response that lands after unmount is dropped instead of applied.

use std::future::Future;

use tokio::sync::watch;

/// Owning side. Dropping it unmounts the view.
pub struct ViewScope {
    tx: watch::Sender<bool>,
}

/// Observing side, cheap to clone into tasks.
#[derive(Clone)]
pub struct ScopeHandle {
    rx: watch::Receiver<bool>,
}

impl ViewScope {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx }
    }

    pub fn handle(&self) -> ScopeHandle {
        ScopeHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_alive(&self) -> bool {
        *self.tx.borrow()
    }

    /// Unmount. Idempotent.
    pub fn close(&self) {
        self.tx.send_if_modified(|alive| std::mem::replace(alive, false));
    }
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.close();
    }
}

impl ScopeHandle {
    /// A handle that is never closed, for state that outlives every view.
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(true);
        Self { rx }
    }

    pub fn is_alive(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the scope is closed.
    pub async fn closed(&self) {
        wait_closed(self.rx.clone()).await;
    }

    /// Run `fut`, yielding its output only if the scope is still alive when
    /// it completes. Closing the scope cancels `fut`.
    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        if !self.is_alive() {
            return None;
        }
        tokio::select! {
            out = fut => self.is_alive().then_some(out),
            _ = wait_closed(self.rx.clone()) => None,
        }
    }

    /// Wrap a callback so it does nothing once the scope is closed.
    pub fn bind<A, F>(&self, f: F) -> impl Fn(A) + Send + Sync + 'static
    where
        A: 'static,
        F: Fn(A) + Send + Sync + 'static,
    {
        let handle = self.clone();
        move |arg| {
            if handle.is_alive() {
                f(arg);
            }
        }
    }

    /// `bind` for one-shot callbacks.
    pub fn bind_once<A, F>(&self, f: F) -> impl FnOnce(A) + Send + 'static
    where
        A: 'static,
        F: FnOnce(A) + Send + 'static,
    {
        let handle = self.clone();
        move |arg| {
            if handle.is_alive() {
                f(arg);
            }
        }
    }
}

async fn wait_closed(mut rx: watch::Receiver<bool>) {
    // `ViewScope` always publishes `false` before its sender goes away, so a
    // bare sender drop only happens for detached handles, which never close.
    if rx.wait_for(|alive| !*alive).await.is_err() {
        std::future::pending::<()>().await;
    }
}
