//! In-memory message transport.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use paceline_client::{MessageFeed, MessageTransport, TransportError};
use paceline_core::{Message, UserId};
use tokio::sync::mpsc;

/// Conversation address: the participant pair, sorted.
type PairKey = (String, String);

fn pair_key(a: &UserId, b: &UserId) -> PairKey {
    let (a, b) = (a.as_str().to_owned(), b.as_str().to_owned());
    if a <= b { (a, b) } else { (b, a) }
}

/// In-memory transport implementation for testing and simulation
///
/// Keeps one message log per conversation with transport-assigned ids and a
/// logical clock for timestamps. Every mutation broadcasts the full current
/// list to all live feeds, and `subscribe` delivers the current history as
/// its first item. All state is wrapped in Arc<Mutex<>> to allow Clone and
/// concurrent access. Uses `lock().expect()` which will panic if the mutex
/// is poisoned - acceptable for test code.
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryTransportInner>>,
}

struct MemoryTransportInner {
    /// Message log per conversation, in send order
    logs: HashMap<PairKey, Vec<Message>>,

    /// Live feed senders per conversation
    feeds: HashMap<PairKey, Vec<mpsc::UnboundedSender<Vec<Message>>>>,

    /// Source for transport-assigned message ids
    next_message: u64,

    /// Logical clock for timestamps
    clock: u64,

    /// When set, `send` fails with this error
    send_failure: Option<TransportError>,

    /// When set, `subscribe` fails with this error
    subscribe_failure: Option<TransportError>,

    /// `send` calls observed, including failed ones
    send_attempts: u64,
}

impl MemoryTransport {
    /// Create a new empty `MemoryTransport`
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryTransportInner {
                logs: HashMap::new(),
                feeds: HashMap::new(),
                next_message: 0,
                clock: 0,
                send_failure: None,
                subscribe_failure: None,
                send_attempts: 0,
            })),
        }
    }

    /// Make every subsequent `send` fail with `error`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned (a thread panicked while
    /// holding the lock). This is acceptable for test/simulation code.
    #[allow(clippy::expect_used)]
    pub fn fail_sends(&self, error: TransportError) {
        self.inner.lock().expect("Mutex poisoned").send_failure = Some(error);
    }

    /// Let `send` succeed again.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    pub fn restore_sends(&self) {
        self.inner.lock().expect("Mutex poisoned").send_failure = None;
    }

    /// Make every subsequent `subscribe` fail with `error`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    pub fn refuse_subscriptions(&self, error: TransportError) {
        self.inner.lock().expect("Mutex poisoned").subscribe_failure = Some(error);
    }

    /// Let `subscribe` succeed again.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    pub fn allow_subscriptions(&self) {
        self.inner.lock().expect("Mutex poisoned").subscribe_failure = None;
    }

    /// Redeliver the current full list to every live feed for the pair.
    ///
    /// Stands in for backends that push on unrelated document changes.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    pub fn repush(&self, a: &UserId, b: &UserId) {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let pair = pair_key(a, b);
        Self::broadcast(&mut inner, &pair);
    }

    /// Drop every live feed for the pair, simulating a lost connection.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    pub fn drop_feeds(&self, a: &UserId, b: &UserId) {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let pair = pair_key(a, b);
        let dropped = inner.feeds.remove(&pair).unwrap_or_default().len();
        tracing::debug!(pair = ?pair, dropped, "dropped feeds");
    }

    /// Messages currently stored for the pair.
    ///
    /// Useful for debugging and testing.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    pub fn message_count(&self, a: &UserId, b: &UserId) -> usize {
        let inner = self.inner.lock().expect("Mutex poisoned");
        inner.logs.get(&pair_key(a, b)).map_or(0, Vec::len)
    }

    /// `send` calls observed so far, including failed ones.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    pub fn send_attempts(&self) -> u64 {
        self.inner.lock().expect("Mutex poisoned").send_attempts
    }

    /// Feeds for the pair whose receivers are still alive.
    ///
    /// Useful for subscription leak checks.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    pub fn live_feed_count(&self, a: &UserId, b: &UserId) -> usize {
        let inner = self.inner.lock().expect("Mutex poisoned");
        inner
            .feeds
            .get(&pair_key(a, b))
            .map_or(0, |feeds| feeds.iter().filter(|feed| !feed.is_closed()).count())
    }

    /// Send the pair's full list to its feeds, pruning closed ones.
    fn broadcast(inner: &mut MemoryTransportInner, pair: &PairKey) {
        let list = inner.logs.get(pair).cloned().unwrap_or_default();
        if let Some(feeds) = inner.feeds.get_mut(pair) {
            feeds.retain(|feed| feed.send(list.clone()).is_ok());
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageTransport for MemoryTransport {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    async fn send(
        &self,
        trainer: &UserId,
        client: &UserId,
        sender: &UserId,
        text: &str,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        inner.send_attempts += 1;
        if let Some(error) = inner.send_failure.clone() {
            return Err(error);
        }

        inner.next_message += 1;
        inner.clock += 1;
        let message = Message::new(
            format!("m{}", inner.next_message),
            sender.clone(),
            text,
            inner.clock,
        );

        let pair = pair_key(trainer, client);
        inner.logs.entry(pair.clone()).or_default().push(message);
        Self::broadcast(&mut inner, &pair);

        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    async fn subscribe(
        &self,
        trainer: &UserId,
        client: &UserId,
    ) -> Result<MessageFeed, TransportError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        if let Some(error) = inner.subscribe_failure.clone() {
            return Err(error);
        }

        let pair = pair_key(trainer, client);
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();

        // The first item is the current history, possibly empty.
        let snapshot = inner.logs.get(&pair).cloned().unwrap_or_default();
        let _ = feed_tx.send(snapshot);

        inner.feeds.entry(pair.clone()).or_default().push(feed_tx);
        tracing::debug!(pair = ?pair, "feed opened");

        Ok(feed_rx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn trainer() -> UserId {
        UserId::new("trainer-1")
    }

    fn client() -> UserId {
        UserId::new("client-1")
    }

    #[tokio::test]
    async fn subscribe_delivers_history_as_first_item() {
        let transport = MemoryTransport::new();
        transport.send(&trainer(), &client(), &trainer(), "one").await.unwrap();
        transport.send(&trainer(), &client(), &client(), "two").await.unwrap();

        let mut feed = transport.subscribe(&trainer(), &client()).await.unwrap();

        let snapshot = feed.recv().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].text, "one");
        assert_eq!(snapshot[1].text, "two");
    }

    #[tokio::test]
    async fn subscribe_to_empty_conversation_delivers_empty_snapshot() {
        let transport = MemoryTransport::new();

        let mut feed = transport.subscribe(&trainer(), &client()).await.unwrap();

        assert_eq!(feed.recv().await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn send_broadcasts_full_list_to_feeds() {
        let transport = MemoryTransport::new();
        let mut feed = transport.subscribe(&trainer(), &client()).await.unwrap();
        let _ = feed.recv().await.unwrap();

        transport.send(&trainer(), &client(), &client(), "hello").await.unwrap();

        let push = feed.recv().await.unwrap();
        assert_eq!(push.len(), 1);
        assert_eq!(push[0].sender_id, client());
        assert_eq!(push[0].text, "hello");
    }

    #[tokio::test]
    async fn pair_order_does_not_matter() {
        let transport = MemoryTransport::new();
        let mut feed = transport.subscribe(&trainer(), &client()).await.unwrap();
        let _ = feed.recv().await.unwrap();

        // Send with the pair reversed; it is the same conversation.
        transport.send(&client(), &trainer(), &trainer(), "hi").await.unwrap();

        let push = feed.recv().await.unwrap();
        assert_eq!(push.len(), 1);
        assert_eq!(transport.message_count(&trainer(), &client()), 1);
    }

    #[tokio::test]
    async fn ids_are_unique_and_timestamps_ascend() {
        let transport = MemoryTransport::new();
        for text in ["a", "b", "c"] {
            transport.send(&trainer(), &client(), &trainer(), text).await.unwrap();
        }

        let mut feed = transport.subscribe(&trainer(), &client()).await.unwrap();
        let snapshot = feed.recv().await.unwrap();

        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.windows(2).all(|pair| pair[0].timestamp < pair[1].timestamp));
        assert!(snapshot.windows(2).all(|pair| pair[0].id != pair[1].id));
    }

    #[tokio::test]
    async fn injected_send_failure_rejects_without_storing() {
        let transport = MemoryTransport::new();
        transport.fail_sends(TransportError::Unavailable("offline".into()));

        let result = transport.send(&trainer(), &client(), &trainer(), "lost").await;

        assert_eq!(result, Err(TransportError::Unavailable("offline".into())));
        assert_eq!(transport.message_count(&trainer(), &client()), 0);
        assert_eq!(transport.send_attempts(), 1);

        transport.restore_sends();
        transport.send(&trainer(), &client(), &trainer(), "back").await.unwrap();
        assert_eq!(transport.message_count(&trainer(), &client()), 1);
    }

    #[tokio::test]
    async fn injected_subscribe_failure_rejects() {
        let transport = MemoryTransport::new();
        transport.refuse_subscriptions(TransportError::Denied("no access".into()));

        let result = transport.subscribe(&trainer(), &client()).await;
        assert!(matches!(result, Err(TransportError::Denied(_))));

        transport.allow_subscriptions();
        assert!(transport.subscribe(&trainer(), &client()).await.is_ok());
    }

    #[tokio::test]
    async fn dropped_feeds_stop_receiving() {
        let transport = MemoryTransport::new();
        let mut feed = transport.subscribe(&trainer(), &client()).await.unwrap();
        let _ = feed.recv().await.unwrap();
        assert_eq!(transport.live_feed_count(&trainer(), &client()), 1);

        transport.drop_feeds(&trainer(), &client());

        assert_eq!(feed.recv().await, None);
        assert_eq!(transport.live_feed_count(&trainer(), &client()), 0);
    }

    #[tokio::test]
    async fn repush_redelivers_the_same_list() {
        let transport = MemoryTransport::new();
        transport.send(&trainer(), &client(), &client(), "hello").await.unwrap();

        let mut feed = transport.subscribe(&trainer(), &client()).await.unwrap();
        let snapshot = feed.recv().await.unwrap();

        transport.repush(&trainer(), &client());

        assert_eq!(feed.recv().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn closed_receivers_are_pruned_on_broadcast() {
        let transport = MemoryTransport::new();
        let feed = transport.subscribe(&trainer(), &client()).await.unwrap();
        drop(feed);

        transport.send(&trainer(), &client(), &trainer(), "into the void").await.unwrap();

        assert_eq!(transport.live_feed_count(&trainer(), &client()), 0);
    }
}
