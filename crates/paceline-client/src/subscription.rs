//! Subscription lifecycle.
//!
//! One feed pump task runs per live conversation subscription. Handles
//! returned by the controller share the pump through a refcounted registry
//! entry, so a badge watcher and an open thread view over the same key cost
//! one transport subscription, and closing one of them does not starve the
//! other.

#![allow(
    clippy::disallowed_types,
    reason = "Registry and store critical sections are synchronous and never held across an await"
)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use paceline_core::{ConversationKey, Message, UserId, reconcile};
use tokio::task::AbortHandle;

use crate::transport::MessageFeed;
use crate::view::{StoreCell, lock_store};

/// Shared state of one live subscription.
#[derive(Debug)]
pub(crate) struct SubscriptionShared {
    alive: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl SubscriptionShared {
    pub(crate) fn new(alive: Arc<AtomicBool>, abort: AbortHandle) -> Self {
        Self { alive, abort }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark the subscription dead, then stop the pump.
    ///
    /// The flag flips before the abort so a push that already left the feed
    /// channel can never apply afterwards.
    fn shut_down(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.abort.abort();
    }
}

/// Registry entry: the shared subscription plus how many handles watch it.
#[derive(Debug)]
pub(crate) struct SubscriptionEntry {
    pub(crate) shared: Arc<SubscriptionShared>,
    pub(crate) watchers: u32,
}

/// Live subscriptions by conversation key.
pub(crate) type SubscriptionRegistry = Arc<Mutex<HashMap<ConversationKey, SubscriptionEntry>>>;

pub(crate) fn new_registry() -> SubscriptionRegistry {
    Arc::new(Mutex::new(HashMap::new()))
}

pub(crate) fn lock_registry(
    registry: &SubscriptionRegistry,
) -> MutexGuard<'_, HashMap<ConversationKey, SubscriptionEntry>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Teardown handle for an opened or watched conversation.
///
/// Closing is idempotent, and dropping the handle closes it. The last handle
/// for a key stops the feed pump and flips the store's subscribed flag off.
/// A handle from [`ConversationController::open_conversation`] additionally
/// clears the active conversation, but only while the activation it was
/// opened with is still the current one.
///
/// [`ConversationController::open_conversation`]: crate::ConversationController::open_conversation
#[derive(Debug)]
pub struct ConversationHandle {
    key: ConversationKey,
    shared: Arc<SubscriptionShared>,
    registry: SubscriptionRegistry,
    store: StoreCell,
    active_epoch: Option<u64>,
    closed: AtomicBool,
}

impl ConversationHandle {
    pub(crate) fn new(
        key: ConversationKey,
        shared: Arc<SubscriptionShared>,
        registry: SubscriptionRegistry,
        store: StoreCell,
        active_epoch: Option<u64>,
    ) -> Self {
        Self {
            key,
            shared,
            registry,
            store,
            active_epoch,
            closed: AtomicBool::new(false),
        }
    }

    /// Key of the conversation this handle watches.
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Whether the underlying subscription is still delivering pushes.
    ///
    /// Turns false after the last handle closes or after the transport ends
    /// the feed.
    pub fn is_live(&self) -> bool {
        self.shared.is_alive()
    }

    /// Release this handle's share of the subscription.
    ///
    /// Safe to call any number of times and at any moment, including before
    /// the first push has arrived.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let last = {
            let mut registry = lock_registry(&self.registry);
            if let Some(entry) = registry.get_mut(&self.key)
                && Arc::ptr_eq(&entry.shared, &self.shared)
            {
                entry.watchers = entry.watchers.saturating_sub(1);
                if entry.watchers == 0 {
                    registry.remove(&self.key);
                    true
                } else {
                    false
                }
            } else {
                // A lost feed let a newer subscription replace this one; the
                // newer one owns the entry now.
                false
            }
        };

        if last {
            self.shared.shut_down();
        }

        let mut store = lock_store(&self.store);
        if last {
            store.set_subscribed(&self.key, false);
        }
        // A mismatched epoch means a newer activation, possibly of this same
        // key, owns the active mark now.
        if let Some(epoch) = self.active_epoch
            && store.active_epoch() == Some(epoch)
        {
            store.clear_active();
        }
        drop(store);

        tracing::debug!(key = %self.key, last, "conversation handle closed");
    }
}

impl Drop for ConversationHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pump one subscription's feed into the store.
///
/// Runs until the feed ends or teardown aborts the task. Each push is
/// applied atomically under the store lock.
pub(crate) async fn run_feed(
    mut feed: MessageFeed,
    store: StoreCell,
    alive: Arc<AtomicBool>,
    key: ConversationKey,
    viewer: UserId,
) {
    while let Some(push) = feed.recv().await {
        if !apply_push(&store, &alive, &key, &viewer, push) {
            return;
        }
    }

    // The transport ended the feed. If teardown did not already run, record
    // the loss; the next open or watch subscribes fresh.
    if alive.swap(false, Ordering::SeqCst) {
        lock_store(&store).set_subscribed(&key, false);
        tracing::warn!(key = %key, "message feed ended, subscription lost");
    }
}

/// Apply one full-list push. Returns false when the subscription was torn
/// down and the push must be discarded.
fn apply_push(
    store: &StoreCell,
    alive: &AtomicBool,
    key: &ConversationKey,
    viewer: &UserId,
    push: Vec<Message>,
) -> bool {
    let mut store = lock_store(store);

    // Liveness is checked inside the critical section. Teardown flips the
    // flag before its own store write, so a push that raced past the channel
    // cannot resurrect subscribed state after a close.
    if !alive.load(Ordering::SeqCst) {
        tracing::warn!(key = %key, "discarding push for torn-down subscription");
        return false;
    }

    let fresh = reconcile::fresh_senders(store.messages_of(key), &push);
    store.replace_messages(key, push);
    store.increment_unread(key, &fresh, viewer);
    store.set_subscribed(key, true);
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store_cell() -> StoreCell {
        crate::view::new_store_cell()
    }

    fn key() -> ConversationKey {
        ConversationKey::between(&UserId::new("trainer-1"), &UserId::new("client-1")).unwrap()
    }

    fn client_says(id: &str, text: &str, timestamp: u64) -> Message {
        Message::new(id, UserId::new("client-1"), text, timestamp)
    }

    #[test]
    fn push_applies_while_alive() {
        let store = store_cell();
        let alive = AtomicBool::new(true);
        let viewer = UserId::new("trainer-1");

        let applied = apply_push(
            &store,
            &alive,
            &key(),
            &viewer,
            vec![client_says("m1", "hello", 1)],
        );

        assert!(applied);
        let store = lock_store(&store);
        assert_eq!(store.messages_of(&key()).len(), 1);
        assert_eq!(store.unread_of(&key()), 1);
        assert!(store.is_subscribed(&key()));
    }

    #[test]
    fn stale_push_is_discarded() {
        let store = store_cell();
        let alive = AtomicBool::new(false);
        let viewer = UserId::new("trainer-1");

        let applied = apply_push(
            &store,
            &alive,
            &key(),
            &viewer,
            vec![client_says("m1", "hello", 1)],
        );

        assert!(!applied);
        let store = lock_store(&store);
        assert!(store.messages_of(&key()).is_empty());
        assert_eq!(store.unread_of(&key()), 0);
        assert!(!store.is_subscribed(&key()));
    }

    #[test]
    fn redelivered_push_does_not_double_count() {
        let store = store_cell();
        let alive = AtomicBool::new(true);
        let viewer = UserId::new("trainer-1");
        let push = vec![client_says("m1", "hello", 1)];

        assert!(apply_push(&store, &alive, &key(), &viewer, push.clone()));
        assert!(apply_push(&store, &alive, &key(), &viewer, push));

        let store = lock_store(&store);
        assert_eq!(store.messages_of(&key()).len(), 1);
        assert_eq!(store.unread_of(&key()), 1);
    }

    #[test]
    fn own_messages_never_count_as_unread() {
        let store = store_cell();
        let alive = AtomicBool::new(true);
        let viewer = UserId::new("trainer-1");

        let push = vec![Message::new("m1", viewer.clone(), "checking in", 1)];
        assert!(apply_push(&store, &alive, &key(), &viewer, push));

        let store = lock_store(&store);
        assert_eq!(store.messages_of(&key()).len(), 1);
        assert_eq!(store.unread_of(&key()), 0);
    }
}
