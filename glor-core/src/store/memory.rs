//! In-process record store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::{is_valid_collection, sort_documents, RecordStore, StoreError, WatchCallback};
use crate::record::Document;
use crate::schema::{Fields, OrderBy};
use crate::subscription::Unsubscribe;

/// Buffer of pending change notifications per collection.
const CHANGE_BUFFER: usize = 16;

/// Record store that keeps collections in memory.
///
/// Clones share the same data. Documents keep insertion order. Watchers
/// are notified through a broadcast channel per collection and re-read the
/// collection on every notification, so a slow watcher skips intermediate
/// states but never sees them out of order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    channels: RwLock<HashMap<String, broadcast::Sender<()>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in a collection.
    pub fn count(&self, collection: &str) -> usize {
        let collections = self
            .inner
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        collections.get(collection).map_or(0, Vec::len)
    }

    fn check_collection(collection: &str) -> Result<(), StoreError> {
        if is_valid_collection(collection) {
            Ok(())
        } else {
            Err(StoreError::InvalidRequest(format!(
                "invalid collection name: {:?}",
                collection
            )))
        }
    }

    fn snapshot(&self, collection: &str, order: Option<OrderBy>) -> Vec<Document> {
        let collections = self
            .inner
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut documents = collections.get(collection).cloned().unwrap_or_default();
        sort_documents(&mut documents, order);
        documents
    }

    fn sender(&self, collection: &str) -> broadcast::Sender<()> {
        let mut channels = self
            .inner
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_BUFFER).0)
            .clone()
    }

    fn notify(&self, collection: &str) {
        let mut channels = self
            .inner
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = channels.get(collection) {
            // Every watcher is gone
            if sender.send(()).is_err() {
                channels.remove(collection);
            }
        }
    }

    #[cfg(test)]
    fn watched_collections(&self) -> usize {
        self.inner
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(
        &self,
        collection: &str,
        order: Option<OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        Self::check_collection(collection)?;
        Ok(self.snapshot(collection, order))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        Self::check_collection(collection)?;
        let collections = self
            .inner
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        Self::check_collection(collection)?;
        let id = Uuid::new_v4().to_string();
        {
            let mut collections = self
                .inner
                .collections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            collections
                .entry(collection.to_string())
                .or_default()
                .push(Document::new(id.clone(), fields));
        }
        self.notify(collection);
        Ok(id)
    }

    async fn overwrite(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        Self::check_collection(collection)?;
        {
            let mut collections = self
                .inner
                .collections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let document = collections
                .get_mut(collection)
                .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
                .ok_or_else(|| StoreError::not_found(collection, id))?;
            document.fields = fields;
        }
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        Self::check_collection(collection)?;
        let removed = {
            let mut collections = self
                .inner
                .collections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            match collections.get_mut(collection) {
                Some(docs) => {
                    let before = docs.len();
                    docs.retain(|doc| doc.id != id);
                    docs.len() != before
                }
                None => false,
            }
        };
        if removed {
            self.notify(collection);
        }
        Ok(())
    }

    async fn watch(
        &self,
        collection: &str,
        order: Option<OrderBy>,
        on_change: WatchCallback,
    ) -> Result<Unsubscribe, StoreError> {
        Self::check_collection(collection)?;

        // Subscribe before the first read so no change can slip in between.
        let mut changes = self.sender(collection).subscribe();
        let store = self.clone();
        let collection = collection.to_string();

        let handle = tokio::spawn(async move {
            on_change(Ok(store.snapshot(&collection, order)));
            loop {
                match changes.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        on_change(Ok(store.snapshot(&collection, order)));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(Unsubscribe::from_task(handle))
    }
}
