//! In-process delivery of [`AuthEvent`]s from the identity provider to its
//! subscribers.
//!
//! Each subscriber owns an unbounded FIFO drained by a single task, so a
//! handler sees events exactly in emission order and a slow handler never
//! causes drops.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::models::event::AuthEvent;

type Subscribers = Mutex<BTreeMap<u64, mpsc::UnboundedSender<AuthEvent>>>;

struct ChannelInner {
    subscribers: Subscribers,
    next_id: AtomicU64,
}

/// Fan-out channel for auth events.
#[derive(Clone)]
pub struct AuthEventChannel {
    inner: Arc<ChannelInner>,
}

impl Default for AuthEventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEventChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                subscribers: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers `handler` for every event emitted from now on.
    ///
    /// Must be called from within a tokio runtime: the handler runs on a
    /// dedicated task that lives until the subscription is released.
    pub fn subscribe<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(AuthEvent) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuthEvent>();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handler(event);
            }
            tracing::debug!("📭 Auth event subscriber {} drained", id);
        });

        tracing::debug!("📬 Auth event subscriber {} registered", id);

        Subscription {
            id,
            channel: Arc::downgrade(&self.inner),
            released: false,
        }
    }

    /// Delivers `event` to every live subscriber.
    pub fn emit(&self, event: AuthEvent) {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        tracing::debug!(
            "📣 Emitting {} to {} subscriber(s)",
            event.kind,
            subscribers.len()
        );

        subscribers.retain(|id, tx| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                tracing::warn!("Auth event subscriber {} is gone, dropping it", id);
            }
            delivered
        });
    }

    /// The number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// The capability to stop receiving events.
///
/// Dropping a subscription releases it silently; call [`Subscription::unsubscribe`]
/// to observe failures. Events already emitted are still delivered.
pub struct Subscription {
    id: u64,
    channel: Weak<ChannelInner>,
    released: bool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Releases the subscription.
    ///
    /// # Returns
    ///
    /// An error if the channel no longer exists or the subscription was
    /// already removed.
    pub fn unsubscribe(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let channel = self
            .channel
            .upgrade()
            .ok_or_else(|| AppError::Provider("Auth event channel already closed".to_string()))?;

        let removed = channel
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);

        match removed {
            Some(_) => {
                tracing::debug!("📪 Auth event subscriber {} released", self.id);
                Ok(())
            }
            None => Err(AppError::Provider(format!(
                "Auth event subscriber {} was not registered",
                self.id
            ))),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
