//! Conversation orchestration.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use paceline_core::{ConversationKey, UserId};

use crate::error::ClientError;
use crate::subscription::{
    ConversationHandle, SubscriptionEntry, SubscriptionRegistry, SubscriptionShared,
    lock_registry, new_registry, run_feed,
};
use crate::transport::{MessageFeed, MessageTransport};
use crate::view::{SharedStore, StoreCell, lock_store, new_store_cell};

/// Orchestrates trainer/client conversations over a message transport.
///
/// The controller is the single writer of conversation state: it derives
/// keys, keeps at-most-one live subscription per conversation, applies
/// transport pushes, and sends messages without ever writing them locally.
/// Clones share the same state and subscription registry.
///
/// Opening or watching a conversation spawns a feed pump task, so the
/// controller must be used from within a tokio runtime.
#[derive(Clone)]
pub struct ConversationController<T: MessageTransport> {
    transport: T,
    state: StoreCell,
    registry: SubscriptionRegistry,
}

impl<T: MessageTransport> ConversationController<T> {
    /// Create a controller over `transport` with empty state.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: new_store_cell(),
            registry: new_registry(),
        }
    }

    /// Read-only selector surface for the presentation layer.
    pub fn store(&self) -> SharedStore {
        SharedStore::new(Arc::clone(&self.state))
    }

    /// Open a conversation: mark it active, zero its unread count, and
    /// ensure a live subscription feeds it.
    ///
    /// An existing live subscription for the key is reused, so remounting a
    /// thread view does not re-subscribe. If subscribing fails the error is
    /// returned and the conversation stays active; the caller is already
    /// showing the thread in its error state and decides whether to retry.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Identity`] for invalid participant ids and
    /// [`ClientError::Transport`] when the subscription cannot be opened.
    pub async fn open_conversation(
        &self,
        trainer: &UserId,
        client: &UserId,
        viewer: &UserId,
    ) -> Result<ConversationHandle, ClientError> {
        let key = ConversationKey::between(trainer, client)?;
        viewer.validate()?;

        let epoch = {
            let mut store = lock_store(&self.state);
            let epoch = store.set_active(trainer.clone(), client.clone(), key.clone());
            store.mark_read(&key);
            epoch
        };

        let shared = self.ensure_subscribed(trainer, client, viewer, &key).await?;
        tracing::debug!(key = %key, "conversation opened");
        Ok(ConversationHandle::new(
            key,
            shared,
            Arc::clone(&self.registry),
            Arc::clone(&self.state),
            Some(epoch),
        ))
    }

    /// Subscribe to a conversation without making it active.
    ///
    /// Pushes accumulate unread counts as usual; this is the path behind
    /// list-screen badges. The returned handle tears the subscription down
    /// exactly like one from [`Self::open_conversation`], minus the active
    /// bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Identity`] for invalid participant ids and
    /// [`ClientError::Transport`] when the subscription cannot be opened.
    pub async fn watch_conversation(
        &self,
        trainer: &UserId,
        client: &UserId,
        viewer: &UserId,
    ) -> Result<ConversationHandle, ClientError> {
        let key = ConversationKey::between(trainer, client)?;
        viewer.validate()?;

        let shared = self.ensure_subscribed(trainer, client, viewer, &key).await?;
        tracing::debug!(key = %key, "conversation watched");
        Ok(ConversationHandle::new(
            key,
            shared,
            Arc::clone(&self.registry),
            Arc::clone(&self.state),
            None,
        ))
    }

    /// Close a conversation handle.
    ///
    /// Equivalent to [`ConversationHandle::close`]; provided so call sites
    /// read as a controller operation.
    pub fn close_conversation(&self, handle: ConversationHandle) {
        handle.close();
    }

    /// Send one message to the conversation between `trainer` and `client`.
    ///
    /// Text is trimmed before sending. Nothing is written locally on
    /// success: the sent message becomes visible through the push feed,
    /// which keeps one ingestion path and avoids provisional entries that
    /// would need dedup later.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EmptyMessage`] for empty or whitespace-only
    /// text before any transport call, [`ClientError::Identity`] for invalid
    /// participant ids, and [`ClientError::Transport`] when the backend
    /// rejects the message. Failures leave conversation state untouched.
    pub async fn send_message(
        &self,
        trainer: &UserId,
        client: &UserId,
        sender: &UserId,
        text: &str,
    ) -> Result<(), ClientError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        // Derivation validates the pair; the transport itself is addressed
        // by the raw ids.
        ConversationKey::between(trainer, client)?;
        sender.validate()?;

        self.transport.send(trainer, client, sender, trimmed).await?;
        Ok(())
    }

    /// Zero the unread count for `key` without making it active.
    ///
    /// Exists for flows that clear a badge before any thread view mounts,
    /// such as a notification tap.
    pub fn mark_conversation_read(&self, key: &ConversationKey) {
        lock_store(&self.state).mark_read(key);
    }

    /// Reuse the live subscription for `key` or create a fresh one.
    async fn ensure_subscribed(
        &self,
        trainer: &UserId,
        client: &UserId,
        viewer: &UserId,
        key: &ConversationKey,
    ) -> Result<Arc<SubscriptionShared>, ClientError> {
        if let Some(shared) = self.reuse_live(key) {
            return Ok(shared);
        }

        let feed = self.transport.subscribe(trainer, client).await?;
        Ok(self.register_feed(key, viewer, feed))
    }

    fn reuse_live(&self, key: &ConversationKey) -> Option<Arc<SubscriptionShared>> {
        let mut registry = lock_registry(&self.registry);
        let entry = registry.get_mut(key)?;
        if !entry.shared.is_alive() {
            // A lost feed leaves a dead entry behind; subscribe fresh and
            // let the new entry replace it.
            return None;
        }
        entry.watchers += 1;
        tracing::debug!(key = %key, watchers = entry.watchers, "reusing live subscription");
        Some(Arc::clone(&entry.shared))
    }

    fn register_feed(
        &self,
        key: &ConversationKey,
        viewer: &UserId,
        feed: MessageFeed,
    ) -> Arc<SubscriptionShared> {
        let mut registry = lock_registry(&self.registry);

        // subscribe() ran outside the registry lock, so a concurrent open
        // may have registered first. Join its subscription and drop the
        // extra feed, which cancels it on the transport side.
        if let Some(entry) = registry.get_mut(key)
            && entry.shared.is_alive()
        {
            entry.watchers += 1;
            return Arc::clone(&entry.shared);
        }

        let alive = Arc::new(AtomicBool::new(true));
        let pump = tokio::spawn(run_feed(
            feed,
            Arc::clone(&self.state),
            Arc::clone(&alive),
            key.clone(),
            viewer.clone(),
        ));
        let shared = Arc::new(SubscriptionShared::new(alive, pump.abort_handle()));
        registry.insert(
            key.clone(),
            SubscriptionEntry {
                shared: Arc::clone(&shared),
                watchers: 1,
            },
        );
        tracing::debug!(key = %key, "subscription established");
        shared
    }
}
