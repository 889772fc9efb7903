//! Conversation identity.
//!
//! A conversation is identified by the unordered pair of its participants.
//! [`ConversationKey::between`] derives the same key no matter which side
//! supplies the pair, so a trainer opening a thread and a client opening the
//! same thread always land on identical state.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separates the two participant ids inside a derived key. Ids containing
/// this character are rejected so distinct pairs can never collide.
const KEY_SEPARATOR: char = '#';

/// Identity validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidIdentity {
    /// A participant id was empty.
    #[error("participant id is empty")]
    Empty,

    /// A participant id contains the reserved key separator.
    #[error("participant id {0:?} contains the reserved character '#'")]
    ContainsSeparator(String),
}

/// Opaque user identifier supplied by the identity provider.
///
/// No semantic validation is performed beyond what key derivation needs;
/// whether an id denotes a trainer or a client is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that this id is usable in key derivation.
    pub fn validate(&self) -> Result<(), InvalidIdentity> {
        if self.0.is_empty() {
            return Err(InvalidIdentity::Empty);
        }
        if self.0.contains(KEY_SEPARATOR) {
            return Err(InvalidIdentity::ContainsSeparator(self.0.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier for a trainer/client message thread.
///
/// Derivation is symmetric: `between(a, b) == between(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Derive the key for the unordered pair `{a, b}`.
    ///
    /// The two ids are ordered lexicographically and joined with a separator
    /// that is rejected inside ids, keeping the mapping injective over pairs.
    pub fn between(a: &UserId, b: &UserId) -> Result<Self, InvalidIdentity> {
        a.validate()?;
        b.validate()?;
        let (first, second) = if a.as_str() <= b.as_str() { (a, b) } else { (b, a) };
        Ok(Self(format!("{first}{KEY_SEPARATOR}{second}")))
    }

    /// The derived key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_symmetric() {
        let trainer = UserId::new("trainer-7");
        let client = UserId::new("client-3");

        let forward = ConversationKey::between(&trainer, &client).unwrap();
        let reverse = ConversationKey::between(&client, &trainer).unwrap();

        assert_eq!(forward, reverse);
    }

    #[test]
    fn key_orders_ids_lexicographically() {
        let a = UserId::new("alpha");
        let b = UserId::new("beta");

        let key = ConversationKey::between(&b, &a).unwrap();
        assert_eq!(key.as_str(), "alpha#beta");
    }

    #[test]
    fn distinct_pairs_produce_distinct_keys() {
        let key_ab = ConversationKey::between(&UserId::new("a"), &UserId::new("b")).unwrap();
        let key_ac = ConversationKey::between(&UserId::new("a"), &UserId::new("c")).unwrap();

        assert_ne!(key_ab, key_ac);
    }

    #[test]
    fn empty_id_is_rejected() {
        let empty = UserId::new("");
        let other = UserId::new("client-3");

        let result = ConversationKey::between(&empty, &other);
        assert_eq!(result, Err(InvalidIdentity::Empty));

        let result = ConversationKey::between(&other, &empty);
        assert_eq!(result, Err(InvalidIdentity::Empty));
    }

    #[test]
    fn separator_in_id_is_rejected() {
        let bad = UserId::new("a#b");
        let other = UserId::new("c");

        let result = ConversationKey::between(&bad, &other);
        assert!(matches!(result, Err(InvalidIdentity::ContainsSeparator(id)) if id == "a#b"));
    }

    #[test]
    fn same_participant_twice_still_derives() {
        let solo = UserId::new("self");
        let key = ConversationKey::between(&solo, &solo).unwrap();
        assert_eq!(key.as_str(), "self#self");
    }
}
