//! # Dispatch Waiters
//!
//! One-shot and streaming waits built on top of the registry. A waiter
//! registers a filtering callback on creation and removes it on drop, so an
//! abandoned wait leaves nothing behind.

use crate::registry::{Callback, ListenerId, ListenerRegistry};
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Errors from waiting on a dispatch.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The listener was removed before a matching payload arrived.
    #[error("listener removed before a matching dispatch arrived")]
    Closed,
}

/// Resolves with the first payload of `kind` accepted by the predicate.
pub struct DispatchWaiter<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    registry: Arc<ListenerRegistry<K, P>>,
    kind: K,
    id: ListenerId,
    receiver: oneshot::Receiver<P>,
}

impl<K, P> DispatchWaiter<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug,
    P: Clone + Send + 'static,
{
    /// Register the waiter. Payloads emitted after this call are observed.
    pub fn register<F>(registry: &Arc<ListenerRegistry<K, P>>, kind: K, predicate: F) -> Self
    where
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let sender = Mutex::new(Some(sender));

        let callback: Callback<P> = Arc::new(move |payload: &P| {
            if !predicate(payload) {
                return;
            }
            if let Some(sender) = sender.lock().take() {
                let _ = sender.send(payload.clone());
            }
        });

        let id = registry.on(kind.clone(), callback);

        Self {
            registry: Arc::clone(registry),
            kind,
            id,
            receiver,
        }
    }

    /// Wait for the matching payload.
    pub async fn recv(mut self) -> Result<P, WaitError> {
        (&mut self.receiver).await.map_err(|_| WaitError::Closed)
    }
}

impl<K, P> Drop for DispatchWaiter<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn drop(&mut self) {
        self.registry.off_id(&self.kind, self.id);
    }
}

/// Yields every payload of `kind` accepted by the predicate, in emit order.
pub struct DispatchStream<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    registry: Arc<ListenerRegistry<K, P>>,
    kind: K,
    id: ListenerId,
    receiver: mpsc::UnboundedReceiver<P>,
}

impl<K, P> DispatchStream<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug,
    P: Clone + Send + 'static,
{
    pub fn register<F>(registry: &Arc<ListenerRegistry<K, P>>, kind: K, predicate: F) -> Self
    where
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();

        let callback: Callback<P> = Arc::new(move |payload: &P| {
            if predicate(payload) {
                let _ = sender.send(payload.clone());
            }
        });

        let id = registry.on(kind.clone(), callback);

        Self {
            registry: Arc::clone(registry),
            kind,
            id,
            receiver,
        }
    }

    /// Next matching payload, `None` once the listener has been removed.
    pub async fn recv(&mut self) -> Option<P> {
        self.receiver.recv().await
    }
}

impl<K, P> Drop for DispatchStream<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn drop(&mut self) {
        self.registry.off_id(&self.kind, self.id);
    }
}
