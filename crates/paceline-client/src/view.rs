//! Read-only store access for the presentation layer.
//!
//! [`SharedStore`] is the selector surface handed to presentation code:
//! cloneable, read-only, backed by the same state the controller writes.
//! Every selector returns an owned snapshot, so no lock is held after a call
//! returns.

#![allow(
    clippy::disallowed_types,
    reason = "Store critical sections are synchronous and never held across an await"
)]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use paceline_core::{
    ActiveConversation, ConversationKey, ConversationStore, ConversationSummary, Message,
};

/// Shared handle to the conversation store.
pub(crate) type StoreCell = Arc<Mutex<ConversationStore>>;

pub(crate) fn new_store_cell() -> StoreCell {
    Arc::new(Mutex::new(ConversationStore::new()))
}

/// Lock the store, recovering from poisoning.
///
/// Store operations are single synchronous assignments, so state behind a
/// poisoned lock is still consistent.
pub(crate) fn lock_store(cell: &StoreCell) -> MutexGuard<'_, ConversationStore> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable read-only view of conversation state.
#[derive(Debug, Clone)]
pub struct SharedStore {
    cell: StoreCell,
}

impl SharedStore {
    pub(crate) fn new(cell: StoreCell) -> Self {
        Self { cell }
    }

    /// Messages for `key`, ascending by timestamp.
    pub fn messages_of(&self, key: &ConversationKey) -> Vec<Message> {
        lock_store(&self.cell).messages_of(key).to_vec()
    }

    /// Unread count for `key`. Zero for unknown conversations.
    pub fn unread_of(&self, key: &ConversationKey) -> u32 {
        lock_store(&self.cell).unread_of(key)
    }

    /// Sum of unread counts across all known conversations.
    pub fn total_unread(&self) -> u32 {
        lock_store(&self.cell).total_unread()
    }

    /// Whether `key` is the conversation currently on screen.
    pub fn is_active(&self, key: &ConversationKey) -> bool {
        lock_store(&self.cell).is_active(key)
    }

    /// The active conversation, if any.
    pub fn active(&self) -> Option<ActiveConversation> {
        lock_store(&self.cell).active().cloned()
    }

    /// Whether a live subscription currently feeds `key`.
    pub fn is_subscribed(&self, key: &ConversationKey) -> bool {
        lock_store(&self.cell).is_subscribed(key)
    }

    /// The most recent message for `key`, if any.
    pub fn last_message(&self, key: &ConversationKey) -> Option<Message> {
        lock_store(&self.cell).last_message(key).cloned()
    }

    /// Timestamp of the most recent message for `key`, if any.
    pub fn last_message_timestamp(&self, key: &ConversationKey) -> Option<u64> {
        lock_store(&self.cell).last_message_timestamp(key)
    }

    /// One summary row per known conversation, in no particular order.
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        lock_store(&self.cell).summaries()
    }
}
