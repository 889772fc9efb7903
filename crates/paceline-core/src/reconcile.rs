//! Full-list push reconciliation.
//!
//! The transport delivers the complete ordered message list on every change,
//! never a delta. Writing such a push into the store takes two steps: the
//! incoming list is normalized to the store's invariant (ascending timestamp,
//! unique ids), and the messages that are genuinely new are found by diffing
//! against the ids already held for that conversation. Unread accounting must
//! use that diff; trusting a push to be a delta would double-count on every
//! redelivery.

use std::collections::HashSet;

use crate::identity::UserId;
use crate::message::{Message, MessageId};

/// Sort `messages` ascending by timestamp and drop duplicate ids.
///
/// The sort is stable and the first occurrence of each id wins, so a
/// well-formed push (already ordered, already unique) passes through
/// unchanged.
pub fn normalize(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by_key(|message| message.timestamp);
    let mut seen: HashSet<MessageId> = HashSet::with_capacity(messages.len());
    messages.retain(|message| seen.insert(message.id.clone()));
    messages
}

/// Senders of the messages in `incoming` whose ids are not present in
/// `known`, in delivery order.
///
/// `known` is the conversation's current message list; its ids are the
/// baseline a full-list push is diffed against. Ids repeated inside
/// `incoming` are reported once.
pub fn fresh_senders(known: &[Message], incoming: &[Message]) -> Vec<UserId> {
    let mut seen: HashSet<&MessageId> = known.iter().map(|message| &message.id).collect();
    incoming
        .iter()
        .filter(|message| seen.insert(&message.id))
        .map(|message| message.sender_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, sender: &str, timestamp: u64) -> Message {
        Message::new(id, UserId::new(sender), format!("text-{id}"), timestamp)
    }

    #[test]
    fn normalize_sorts_by_timestamp() {
        let shuffled = vec![msg("m3", "a", 30), msg("m1", "a", 10), msg("m2", "b", 20)];

        let normalized = normalize(shuffled);

        let ids: Vec<&str> = normalized.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
    }

    #[test]
    fn normalize_drops_duplicate_ids() {
        let duplicated = vec![msg("m1", "a", 10), msg("m1", "a", 10), msg("m2", "b", 20)];

        let normalized = normalize(duplicated);

        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].id.as_str(), "m1");
        assert_eq!(normalized[1].id.as_str(), "m2");
    }

    #[test]
    fn normalize_is_stable_for_equal_timestamps() {
        let tied = vec![msg("m1", "a", 10), msg("m2", "b", 10)];

        let normalized = normalize(tied);

        let ids: Vec<&str> = normalized.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2"]);
    }

    #[test]
    fn fresh_senders_diffs_against_known_ids() {
        let known = vec![msg("m1", "client", 10)];
        let incoming =
            vec![msg("m1", "client", 10), msg("m2", "client", 20), msg("m3", "trainer", 30)];

        let fresh = fresh_senders(&known, &incoming);

        assert_eq!(fresh, vec![UserId::new("client"), UserId::new("trainer")]);
    }

    #[test]
    fn fresh_senders_reports_nothing_for_redelivery() {
        let known = vec![msg("m1", "client", 10), msg("m2", "trainer", 20)];
        let incoming = known.clone();

        assert!(fresh_senders(&known, &incoming).is_empty());
    }

    #[test]
    fn fresh_senders_counts_repeated_incoming_id_once() {
        let incoming = vec![msg("m1", "client", 10), msg("m1", "client", 10)];

        let fresh = fresh_senders(&[], &incoming);

        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn fresh_senders_treats_everything_as_new_on_first_push() {
        let incoming = vec![msg("m1", "client", 10), msg("m2", "trainer", 20)];

        let fresh = fresh_senders(&[], &incoming);

        assert_eq!(fresh.len(), 2);
    }
}
