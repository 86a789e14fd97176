use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::limits::EVENT_CHANNEL_CAPACITY;
use crate::model::{BookId, QueueEvent};

/// Broadcast hub for queue events, one channel per book.
pub struct NotifyHub {
    channels: DashMap<BookId, broadcast::Sender<QueueEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a book. Creates the channel if needed.
    pub fn subscribe(&self, book_id: BookId) -> broadcast::Receiver<QueueEvent> {
        let sender = self
            .channels
            .entry(book_id)
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send an event. No-op if nobody is listening.
    pub fn send(&self, book_id: BookId, event: &QueueEvent) {
        if let Some(sender) = self.channels.get(&book_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Send to every book's subscribers.
    pub fn send_all(&self, event: &QueueEvent) {
        for sender in self.channels.iter() {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop channels nobody listens to any more.
    pub fn prune(&self) {
        self.channels.retain(|_, s| s.receiver_count() > 0);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe(7);

        let event = QueueEvent::Queued {
            book_id: 7,
            member_id: 1,
            rank: 1,
        };
        hub.send(7, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        // No subscriber — should not panic
        hub.send(3, &QueueEvent::Reset);
        assert_eq!(hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn send_all_reaches_every_book() {
        let hub = NotifyHub::new();
        let mut a = hub.subscribe(1);
        let mut b = hub.subscribe(2);
        hub.send_all(&QueueEvent::Reset);
        assert_eq!(a.recv().await.unwrap(), QueueEvent::Reset);
        assert_eq!(b.recv().await.unwrap(), QueueEvent::Reset);
    }

    #[test]
    fn prune_drops_unheard_channels() {
        let hub = NotifyHub::new();
        let rx = hub.subscribe(1);
        let _keep = hub.subscribe(2);
        drop(rx);
        hub.prune();
        assert_eq!(hub.channel_count(), 1);
    }
}
