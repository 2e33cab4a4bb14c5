//! Record store clients.
//!
//! [`RecordStore`] is the seam between the CRUD component and whatever
//! document database holds the collections. [`MemoryStore`] keeps
//! everything in-process; [`RemoteStore`] talks to a `glor-store` server
//! over HTTP and WebSocket.

mod error;
mod memory;
mod remote;
pub mod wire;

use async_trait::async_trait;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use remote::{check_server, RemoteStore};

use crate::record::Document;
use crate::schema::{Fields, OrderBy};
use crate::subscription::Unsubscribe;

/// Listener for live collection updates. Each call carries the full current
/// state of the collection, or the error that interrupted the watch.
pub type WatchCallback = Box<dyn Fn(Result<Vec<Document>, StoreError>) + Send + Sync + 'static>;

/// Asynchronous document store addressed by collection name and string id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns every document in the collection. Stores may honor `order`
    /// server-side; callers must not rely on it.
    async fn list(
        &self,
        collection: &str,
        order: Option<OrderBy>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Fails with [`StoreError::NotFound`] if the id is unknown.
    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError>;

    /// Stores a new document and returns its freshly assigned id.
    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// Replaces every field of an existing document. Fails with
    /// [`StoreError::NotFound`] if the id is unknown.
    async fn overwrite(&self, collection: &str, id: &str, fields: Fields)
        -> Result<(), StoreError>;

    /// Deletes a document. Deleting an unknown id succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Pushes the collection's full state to `on_change` once immediately and
    /// again after every change, until the returned handle is dropped or
    /// unsubscribed.
    async fn watch(
        &self,
        collection: &str,
        order: Option<OrderBy>,
        on_change: WatchCallback,
    ) -> Result<Unsubscribe, StoreError>;
}

/// Longest accepted collection name, in bytes.
pub const MAX_COLLECTION_NAME_LEN: usize = 64;

/// Returns true if `name` is usable as a collection name.
pub fn is_valid_collection(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_COLLECTION_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Applies `order` to a document list in place. The sort is stable.
pub fn sort_documents(documents: &mut [Document], order: Option<OrderBy>) {
    if let Some(order) = order {
        documents.sort_by(|a, b| order.compare(&a.fields, &b.fields));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names() {
        assert!(is_valid_collection("featuredGames"));
        assert!(is_valid_collection("hero_section-2"));
        assert!(!is_valid_collection(""));
        assert!(!is_valid_collection("../etc"));
        assert!(!is_valid_collection("a b"));
        assert!(is_valid_collection(&"a".repeat(MAX_COLLECTION_NAME_LEN)));
        assert!(!is_valid_collection(&"a".repeat(MAX_COLLECTION_NAME_LEN + 1)));
    }
}
