//! Message data types.

use serde::{Deserialize, Serialize};

use crate::identity::UserId;

/// Opaque message identifier assigned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a raw id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A chat message within one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Transport-assigned unique id.
    pub id: MessageId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Message body, non-empty and already trimmed.
    pub text: String,
    /// Transport-assigned ordering value, non-decreasing within a
    /// conversation.
    pub timestamp: u64,
}

impl Message {
    /// Create a message.
    pub fn new(
        id: impl Into<String>,
        sender_id: UserId,
        text: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self { id: MessageId::new(id), sender_id, text: text.into(), timestamp }
    }
}
