//! Change notifications for collection watchers.

use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Buffer of pending notifications per collection. Watchers that fall
/// further behind get `Lagged` and simply re-read the collection.
const CHANNEL_CAPACITY: usize = 16;

/// What happened to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Created(String),
    Updated(String),
    Deleted(String),
}

/// Tracks watchers per collection and fans out change notifications.
pub struct ChangeHub {
    channels: RwLock<HashMap<String, broadcast::Sender<Change>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to changes in a collection.
    pub async fn subscribe(&self, collection: &str) -> broadcast::Receiver<Change> {
        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(collection) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(collection.to_string(), sender);
            receiver
        }
    }

    /// Notifies every watcher of a collection. A channel whose watchers
    /// are all gone is dropped.
    pub async fn publish(&self, collection: &str, change: Change) {
        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(collection) {
            tracing::debug!("{}: {:?}", collection, change);
            if sender.send(change).is_err() {
                channels.remove(collection);
            }
        }
    }

    /// Drops the collection's channel if nobody is subscribed any more.
    /// Call after dropping a receiver.
    pub async fn release(&self, collection: &str) {
        let mut channels = self.channels.write().await;

        if channels
            .get(collection)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(collection);
        }
    }

    /// Number of collections with a live channel.
    pub async fn watched_collections(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers_of_that_collection() {
        let hub = ChangeHub::new();
        let mut news = hub.subscribe("news").await;
        let mut about = hub.subscribe("about").await;

        hub.publish("news", Change::Created("n1".into())).await;

        assert_eq!(news.recv().await.unwrap(), Change::Created("n1".into()));
        assert!(about.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let hub = ChangeHub::new();
        hub.publish("news", Change::Deleted("n1".into())).await;

        let mut late = hub.subscribe("news").await;
        hub.publish("news", Change::Updated("n2".into())).await;
        assert_eq!(late.recv().await.unwrap(), Change::Updated("n2".into()));
    }

    #[tokio::test]
    async fn test_release_drops_unwatched_channels() {
        let hub = ChangeHub::new();
        let first = hub.subscribe("news").await;
        let second = hub.subscribe("news").await;
        let about = hub.subscribe("about").await;
        assert_eq!(hub.watched_collections().await, 2);

        drop(first);
        hub.release("news").await;
        assert_eq!(hub.watched_collections().await, 2);

        drop(second);
        hub.release("news").await;
        assert_eq!(hub.watched_collections().await, 1);

        // A publish with no receivers left also cleans up.
        drop(about);
        hub.publish("about", Change::Created("a1".into())).await;
        assert_eq!(hub.watched_collections().await, 0);
    }
}
