use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::record::Snapshot;
use crate::schema::Entity;
use crate::store::{sort_documents, RecordStore, StoreError, WatchCallback};
use crate::subscription::Unsubscribe;

/// Holds the last fetched snapshot of one collection.
///
/// The snapshot is swapped as a whole, so readers see either the old or
/// the new state and never a mix. A failed fetch keeps the old snapshot.
/// While a subscription is live, a fetch that overlaps a push is discarded
/// so [`ListSync::current`] never moves back to an older state.
pub struct ListSync<T> {
    store: Arc<dyn RecordStore>,
    latest: Arc<RwLock<Latest<T>>>,
    _entity: PhantomData<fn() -> T>,
}

struct Latest<T> {
    snapshot: Snapshot<T>,
    /// Bumped on every accepted push.
    pushes: u64,
}

impl<T: Entity> ListSync<T> {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            latest: Arc::new(RwLock::new(Latest {
                snapshot: Snapshot::default(),
                pushes: 0,
            })),
            _entity: PhantomData,
        }
    }

    /// Fetches the whole collection and replaces the held snapshot.
    ///
    /// If a push arrived while the fetch was in flight, the pushed snapshot
    /// is kept and returned instead.
    pub async fn refresh(&self) -> Result<Snapshot<T>, StoreError> {
        let schema = T::schema();
        let pushes_before = read(&self.latest).pushes;

        let mut documents = self
            .store
            .list(schema.collection, schema.order_by)
            .await
            .inspect_err(|e| tracing::warn!("Failed to fetch {}: {}", schema.collection, e))?;

        sort_documents(&mut documents, schema.order_by);
        let snapshot = Snapshot::from_documents(documents)
            .inspect_err(|e| tracing::warn!("Failed to decode {}: {}", schema.collection, e))?;

        let mut latest = write(&self.latest);
        if latest.pushes != pushes_before {
            tracing::debug!(
                "Kept pushed {} snapshot over an overlapping fetch",
                schema.collection
            );
            return Ok(latest.snapshot.clone());
        }
        tracing::debug!(
            "Fetched {} {} record(s)",
            snapshot.len(),
            schema.collection
        );
        latest.snapshot = snapshot.clone();
        Ok(snapshot)
    }

    /// Starts live mode: every upstream change replaces the snapshot and is
    /// handed to `on_change`. Drop or unsubscribe the handle to stop.
    ///
    /// Errors reported by the store are logged and otherwise ignored; use
    /// [`ListSync::subscribe_with_errors`] to act on them.
    pub async fn subscribe<F>(&self, on_change: F) -> Result<Unsubscribe, StoreError>
    where
        F: Fn(Snapshot<T>) + Send + Sync + 'static,
    {
        self.subscribe_with_errors(on_change, |_| {}).await
    }

    /// Like [`ListSync::subscribe`], but also hands every store error to
    /// `on_error`. A [`StoreError::Transport`] means the watch has ended.
    pub async fn subscribe_with_errors<F, E>(
        &self,
        on_change: F,
        on_error: E,
    ) -> Result<Unsubscribe, StoreError>
    where
        F: Fn(Snapshot<T>) + Send + Sync + 'static,
        E: Fn(StoreError) + Send + Sync + 'static,
    {
        let schema = T::schema();
        let cell = Arc::clone(&self.latest);

        let callback: WatchCallback = Box::new(move |result| {
            let decoded = result.and_then(|mut documents| {
                sort_documents(&mut documents, schema.order_by);
                Snapshot::from_documents(documents)
            });
            match decoded {
                Ok(snapshot) => {
                    {
                        let mut latest = write(&cell);
                        latest.pushes = latest.pushes.wrapping_add(1);
                        latest.snapshot = snapshot.clone();
                    }
                    on_change(snapshot);
                }
                Err(e) => {
                    tracing::warn!("Dropped {} update: {}", schema.collection, e);
                    on_error(e);
                }
            }
        });

        self.store
            .watch(schema.collection, schema.order_by, callback)
            .await
    }

    /// The most recently received snapshot; empty before the first fetch.
    pub fn current(&self) -> Snapshot<T> {
        read(&self.latest).snapshot.clone()
    }
}

fn read<T>(cell: &RwLock<Latest<T>>) -> RwLockReadGuard<'_, Latest<T>> {
    cell.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(cell: &RwLock<Latest<T>>) -> RwLockWriteGuard<'_, Latest<T>> {
    cell.write().unwrap_or_else(PoisonError::into_inner)
}
