//! Store wrapper for exercising failure and overlap paths.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::record::Document;
use crate::schema::{Fields, OrderBy};
use crate::store::{MemoryStore, RecordStore, StoreError, WatchCallback};
use crate::subscription::Unsubscribe;

/// Wraps a [`MemoryStore`]. It can fail the next call, stall `list` after
/// reading, counts creates, and yields once before every write so
/// overlapping calls really overlap.
#[derive(Clone, Default)]
pub(crate) struct FlakyStore {
    memory: MemoryStore,
    fail_next: Arc<AtomicBool>,
    fail_lists: Arc<AtomicBool>,
    list_delay_ms: Arc<AtomicU64>,
    creates: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// The next store call fails with a transport error.
    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Every `list` call fails until turned off again.
    pub(crate) fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// `list` reads the collection, then waits this long before returning.
    pub(crate) fn delay_lists(&self, delay: Duration) {
        self.list_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Transport("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn list(
        &self,
        collection: &str,
        order: Option<OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        self.check()?;
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("list unavailable".to_string()));
        }
        let documents = self.memory.list(collection, order).await?;
        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(documents)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        self.check()?;
        self.memory.get(collection, id).await
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        tokio::task::yield_now().await;
        self.check()?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.memory.create(collection, fields).await
    }

    async fn overwrite(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.check()?;
        self.memory.overwrite(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.check()?;
        self.memory.delete(collection, id).await
    }

    async fn watch(
        &self,
        collection: &str,
        order: Option<OrderBy>,
        on_change: WatchCallback,
    ) -> Result<Unsubscribe, StoreError> {
        self.check()?;
        self.memory.watch(collection, order, on_change).await
    }
}
