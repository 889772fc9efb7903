//! Core state for the Paceline coaching messenger
//!
//! Pure data types and state machines for trainer/client conversations,
//! fully decoupled from I/O so the same code can be driven by production
//! transports and by deterministic tests.
//!
//! # Components
//!
//! - [`ConversationKey`]: order-independent identity of a two-party thread
//! - [`Message`]: a single chat message as delivered by the transport
//! - [`ConversationStore`]: single-writer state (messages, unread, active)
//! - [`reconcile`]: full-list push normalization and new-message diffing

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod identity;
mod message;
pub mod reconcile;
mod store;

pub use identity::{ConversationKey, InvalidIdentity, UserId};
pub use message::{Message, MessageId};
pub use store::{ActiveConversation, ConversationState, ConversationStore, ConversationSummary};
