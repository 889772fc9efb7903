//! Transport boundary for real-time messaging.
//!
//! [`MessageTransport`] is the seam between the controller and whatever
//! backend actually moves messages. The controller never talks to a backend
//! directly; production wires in a network implementation, tests wire in an
//! in-memory one, and everything above the trait stays identical.

use async_trait::async_trait;
use paceline_core::{Message, UserId};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors a transport implementation can return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The backend could not be reached.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The caller is not allowed to touch this conversation.
    #[error("access denied: {0}")]
    Denied(String),

    /// The backend understood the request and refused it.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Live push feed for one conversation.
///
/// Every item is the full current message list for the conversation, not a
/// delta. Dropping the receiver cancels the subscription on the transport
/// side.
pub type MessageFeed = mpsc::UnboundedReceiver<Vec<Message>>;

/// Real-time message backend.
///
/// Both operations address a conversation by its raw participant pair; key
/// derivation stays on the controller side. Implementations are cloned into
/// background tasks, so they must be cheap to clone.
#[async_trait]
pub trait MessageTransport: Clone + Send + Sync + 'static {
    /// Persist one message to the conversation between `trainer` and
    /// `client`.
    ///
    /// The created message is not returned. It becomes visible through the
    /// subscription feed, which keeps a single ingestion path for sent and
    /// received messages alike.
    async fn send(
        &self,
        trainer: &UserId,
        client: &UserId,
        sender: &UserId,
        text: &str,
    ) -> Result<(), TransportError>;

    /// Open a live feed of full-list updates for the conversation.
    ///
    /// The first item delivers the current history, possibly empty. Items
    /// carry messages in ascending timestamp order.
    async fn subscribe(
        &self,
        trainer: &UserId,
        client: &UserId,
    ) -> Result<MessageFeed, TransportError>;
}
