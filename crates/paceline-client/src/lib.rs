//! Conversation controller for the Paceline coaching messenger
//!
//! Orchestrates trainer/client conversations over a pluggable real-time
//! transport: at-most-one live subscription per conversation, full-list push
//! reconciliation into a [`paceline_core::ConversationStore`], sends that
//! never write local state (the push feed is the single source of truth),
//! and teardown that survives view mount/unmount churn.
//!
//! # Components
//!
//! - [`MessageTransport`]: the contract a real-time backend implements
//! - [`ConversationController`]: the single writer of conversation state
//! - [`ConversationHandle`]: idempotent teardown for opened or watched threads
//! - [`SharedStore`]: read-only selectors for the presentation layer

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod controller;
mod error;
mod subscription;
mod transport;
mod view;

pub use controller::ConversationController;
pub use error::ClientError;
pub use subscription::ConversationHandle;
pub use transport::{MessageFeed, MessageTransport, TransportError};
pub use view::SharedStore;
