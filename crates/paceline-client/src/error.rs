//! Client-facing error types.

use paceline_core::InvalidIdentity;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by controller operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// A participant id failed validation.
    #[error("invalid identity: {0}")]
    Identity(#[from] InvalidIdentity),

    /// The message text was empty or whitespace-only. No transport call was
    /// made.
    #[error("message text is empty")]
    EmptyMessage,

    /// The transport failed. Conversation state was left untouched, so the
    /// caller can keep the draft and retry.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}
