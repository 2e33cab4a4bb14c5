//! Stored documents, their typed views and list snapshots.

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

use crate::schema::{from_fields, Entity, Fields};
use crate::store::StoreError;

/// A document as the store sees it: a store-assigned id plus a field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// A persisted entity: the immutable store id plus the entity's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    pub id: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Record<T> {
    pub fn new(id: impl Into<String>, data: T) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

impl<T: Entity> Record<T> {
    pub fn from_document(document: Document) -> Result<Self, StoreError> {
        let data = from_fields(document.fields).map_err(|e| {
            StoreError::Decode(format!(
                "{} document {}: {}",
                T::schema().name,
                document.id,
                e
            ))
        })?;
        Ok(Self {
            id: document.id,
            data,
        })
    }
}

/// The last known server state of a collection.
///
/// Snapshots are immutable and shared; refreshing replaces the whole value.
#[derive(Debug)]
pub struct Snapshot<T>(Arc<Vec<Record<T>>>);

impl<T> Snapshot<T> {
    pub fn new(records: Vec<Record<T>>) -> Self {
        Self(Arc::new(records))
    }

    pub fn find(&self, id: &str) -> Option<&Record<T>> {
        self.0.iter().find(|record| record.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.0.iter().map(|record| record.id.as_str()).collect()
    }
}

impl<T: Entity> Snapshot<T> {
    /// Decodes documents in the order given.
    pub fn from_documents(documents: Vec<Document>) -> Result<Self, StoreError> {
        documents
            .into_iter()
            .map(Record::from_document)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = [Record<T>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AboutBlock, Game};
    use crate::schema::to_fields;
    use serde_json::json;

    #[test]
    fn test_record_from_document() {
        let fields = to_fields(&AboutBlock {
            docs: "History".into(),
            description: "Founded in 2020".into(),
        })
        .unwrap();
        let record: Record<AboutBlock> =
            Record::from_document(Document::new("abc", fields)).unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.data.docs, "History");
    }

    #[test]
    fn test_record_from_bad_document() {
        let fields = match json!({"rating": "five"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let result: Result<Record<Game>, _> = Record::from_document(Document::new("g1", fields));
        match result {
            Err(StoreError::Decode(message)) => assert!(message.contains("g1")),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_record_json_is_flat() {
        let record = Record::new("id1", AboutBlock::default());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "id1");
        assert!(json.get("docs").is_some());
    }

    #[test]
    fn test_snapshot_shares_storage() {
        let snapshot = Snapshot::new(vec![Record::new("a", AboutBlock::default())]);
        let copy = snapshot.clone();
        assert_eq!(copy.len(), 1);
        assert!(copy.find("a").is_some());
        assert!(copy.find("b").is_none());
        assert_eq!(snapshot.ids(), vec!["a"]);
    }
}
