//! Conversation state store.
//!
//! [`ConversationStore`] is the single shared, mutable resource of the
//! messaging subsystem. It is a pure state container: every operation is a
//! synchronous atomic mutation, and nothing here performs I/O or fails under
//! valid input. The controller is the only writer; presentation reads
//! through the selectors.
//!
//! # Responsibilities
//!
//! - Holds the ordered, deduplicated message list per conversation.
//! - Tracks per-conversation unread counts, suppressed while a conversation
//!   is active.
//! - Tracks the single active conversation and subscription bookkeeping.

use std::collections::HashMap;

use crate::identity::{ConversationKey, UserId};
use crate::message::Message;
use crate::reconcile;

/// Per-conversation state.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    /// Messages, ascending by timestamp, unique by id. Replaced wholesale on
    /// every transport push.
    pub messages: Vec<Message>,
    /// Messages from the other party observed while the conversation was not
    /// active and not yet marked read.
    pub unread_count: u32,
    /// Timestamp of the most recent message. `None` while the list is empty.
    pub last_message_timestamp: Option<u64>,
    /// Whether a live transport subscription currently owns this key.
    pub subscribed: bool,
}

/// The conversation currently open in the presentation layer.
///
/// At most one exists at a time. The raw participant pair is kept alongside
/// the derived key because the transport is addressed by the pair, not the
/// key. Reopening a conversation is a new activation of the same key, told
/// apart by its epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConversation {
    /// Trainer side of the pair.
    pub trainer: UserId,
    /// Client side of the pair.
    pub client: UserId,
    /// Derived conversation key.
    pub key: ConversationKey,
    /// Activation counter, unique per store.
    pub epoch: u64,
}

/// One row of the conversation-list view.
///
/// Rows are unordered; sorting (typically by `last_message_timestamp`) is a
/// presentation concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    /// Conversation key.
    pub key: ConversationKey,
    /// Unread count for the badge.
    pub unread_count: u32,
    /// Timestamp of the most recent message, if any.
    pub last_message_timestamp: Option<u64>,
    /// Whether a live subscription feeds this conversation.
    pub subscribed: bool,
}

/// In-memory conversation state, single-writer.
///
/// Writes to an absent key create the entry lazily with defaults, so push
/// handlers never have to pre-register a conversation.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<ConversationKey, ConversationState>,
    active: Option<ActiveConversation>,
    activation: u64,
}

impl ConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the active conversation and zero its unread count. Returns the
    /// fresh activation epoch.
    ///
    /// Does not create an entry: an unseen conversation has nothing to mark
    /// read, and its state appears with the first push.
    pub fn set_active(&mut self, trainer: UserId, client: UserId, key: ConversationKey) -> u64 {
        if let Some(state) = self.conversations.get_mut(&key) {
            state.unread_count = 0;
        }
        self.activation = self.activation.wrapping_add(1);
        self.active = Some(ActiveConversation {
            trainer,
            client,
            key,
            epoch: self.activation,
        });
        self.activation
    }

    /// Clear the active conversation. Unread counts are untouched.
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Replace the message list for `key` with a full-list push.
    ///
    /// The list is normalized (ascending timestamp, unique ids) and
    /// `last_message_timestamp` is recomputed from the final entry.
    pub fn replace_messages(&mut self, key: &ConversationKey, messages: Vec<Message>) {
        let messages = reconcile::normalize(messages);
        let state = self.conversations.entry(key.clone()).or_default();
        state.last_message_timestamp = messages.last().map(|message| message.timestamp);
        state.messages = messages;
    }

    /// Account newly observed senders against the unread count.
    ///
    /// Adds one per sender not equal to `viewer`. Suppressed entirely while
    /// `key` is the active conversation.
    pub fn increment_unread(
        &mut self,
        key: &ConversationKey,
        by_senders: &[UserId],
        viewer: &UserId,
    ) {
        if self.is_active(key) {
            return;
        }
        let fresh = by_senders.iter().filter(|sender| *sender != viewer).count() as u32;
        if fresh > 0 {
            let state = self.conversations.entry(key.clone()).or_default();
            state.unread_count = state.unread_count.saturating_add(fresh);
        }
    }

    /// Zero the unread count for `key`.
    pub fn mark_read(&mut self, key: &ConversationKey) {
        self.conversations.entry(key.clone()).or_default().unread_count = 0;
    }

    /// Record whether a live subscription owns `key`.
    pub fn set_subscribed(&mut self, key: &ConversationKey, subscribed: bool) {
        self.conversations.entry(key.clone()).or_default().subscribed = subscribed;
    }

    /// Messages for `key`, empty if the conversation is unknown.
    pub fn messages_of(&self, key: &ConversationKey) -> &[Message] {
        self.conversations.get(key).map_or(&[], |state| state.messages.as_slice())
    }

    /// Unread count for `key`, zero if the conversation is unknown.
    pub fn unread_of(&self, key: &ConversationKey) -> u32 {
        self.conversations.get(key).map_or(0, |state| state.unread_count)
    }

    /// Sum of unread counts across all conversations.
    pub fn total_unread(&self) -> u32 {
        self.conversations
            .values()
            .fold(0, |total, state| total.saturating_add(state.unread_count))
    }

    /// Whether `key` is the active conversation.
    pub fn is_active(&self, key: &ConversationKey) -> bool {
        self.active.as_ref().is_some_and(|active| active.key == *key)
    }

    /// The active conversation, if any.
    pub fn active(&self) -> Option<&ActiveConversation> {
        self.active.as_ref()
    }

    /// Epoch of the current activation, if any.
    pub fn active_epoch(&self) -> Option<u64> {
        self.active.as_ref().map(|active| active.epoch)
    }

    /// Whether a live subscription owns `key`.
    pub fn is_subscribed(&self, key: &ConversationKey) -> bool {
        self.conversations.get(key).is_some_and(|state| state.subscribed)
    }

    /// The most recent message for `key`, if any.
    pub fn last_message(&self, key: &ConversationKey) -> Option<&Message> {
        self.conversations.get(key).and_then(|state| state.messages.last())
    }

    /// Timestamp of the most recent message for `key`, if any.
    pub fn last_message_timestamp(&self, key: &ConversationKey) -> Option<u64> {
        self.conversations.get(key).and_then(|state| state.last_message_timestamp)
    }

    /// One summary row per known conversation, unordered.
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.conversations
            .iter()
            .map(|(key, state)| ConversationSummary {
                key: key.clone(),
                unread_count: state.unread_count,
                last_message_timestamp: state.last_message_timestamp,
                subscribed: state.subscribed,
            })
            .collect()
    }
}
