//! SQLite document storage for the store server.
//!
//! Every collection shares one `documents` table. Fields are stored as a
//! JSON object and decoded back into [`Document`]s on read.

use chrono::Utc;
use glor_core::schema::compare_by_field;
use glor_core::{Document, Fields};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Database file name inside the server's data directory.
pub const DB_FILE: &str = "glor-store.db";

/// Sort order requested by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOrder {
    pub field: String,
    pub descending: bool,
}

impl ListOrder {
    /// Parses the `order_by` and `direction` query parameters. Direction
    /// defaults to ascending.
    pub fn parse(field: Option<&str>, direction: Option<&str>) -> Result<Option<Self>, String> {
        let descending = match direction.map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => return Err(format!("direction must be asc or desc, got {:?}", other)),
        };
        Ok(field.filter(|f| !f.is_empty()).map(|field| Self {
            field: field.to_string(),
            descending,
        }))
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// Could not create the data directory.
    IoError(PathBuf, std::io::Error),
    /// Query or connection failure.
    Database(sqlx::Error),
    /// Schema migration failed.
    Migration(sqlx::migrate::MigrateError),
    /// A stored row holds something other than a JSON object.
    Corrupt { id: String, message: String },
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            StorageError::Database(e) => write!(f, "Database error: {}", e),
            StorageError::Migration(e) => write!(f, "Migration failed: {}", e),
            StorageError::Corrupt { id, message } => {
                write!(f, "Stored document {} is corrupt: {}", id, message)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(_, e) => Some(e),
            StorageError::Database(e) => Some(e),
            StorageError::Migration(e) => Some(e),
            StorageError::Corrupt { .. } => None,
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Database(e)
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    fields: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document, StorageError> {
        let fields: Fields =
            serde_json::from_str(&self.fields).map_err(|e| StorageError::Corrupt {
                id: self.id.clone(),
                message: e.to_string(),
            })?;
        Ok(Document::new(self.id, fields))
    }
}

/// Document storage backed by a SQLite pool. Clones share the pool.
#[derive(Debug, Clone)]
pub struct DocumentStorage {
    pool: SqlitePool,
}

impl DocumentStorage {
    /// Opens (or creates) the database inside `data_dir` and runs migrations.
    pub async fn open(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| StorageError::IoError(data_dir.to_path_buf(), e))?;

        let db_url = format!("sqlite:{}?mode=rwc", data_dir.join(DB_FILE).display());
        let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StorageError::Migration)?;

        Ok(Self { pool })
    }

    /// All documents in a collection, in insertion order unless `order` is
    /// given. Documents missing the order field sort last.
    pub async fn list(
        &self,
        collection: &str,
        order: Option<&ListOrder>,
    ) -> Result<Vec<Document>, StorageError> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT id, fields FROM documents WHERE collection = ? ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut documents = rows
            .into_iter()
            .map(DocumentRow::into_document)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(order) = order {
            documents.sort_by(|a, b| {
                compare_by_field(&order.field, order.descending, &a.fields, &b.fields)
            });
        }
        Ok(documents)
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError> {
        let row: Option<DocumentRow> =
            sqlx::query_as("SELECT id, fields FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(DocumentRow::into_document).transpose()
    }

    /// Inserts a new document and returns its generated id.
    pub async fn create(&self, collection: &str, fields: &Fields) -> Result<String, StorageError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let json = serde_json::to_string(fields).map_err(|e| StorageError::Corrupt {
            id: id.clone(),
            message: e.to_string(),
        })?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(&json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Replaces all fields of a document. Returns false if it does not exist.
    pub async fn overwrite(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
    ) -> Result<bool, StorageError> {
        let json = serde_json::to_string(fields).map_err(|e| StorageError::Corrupt {
            id: id.to_string(),
            message: e.to_string(),
        })?;

        let result = sqlx::query(
            "UPDATE documents SET fields = ?, updated_at = ? WHERE collection = ? AND id = ?",
        )
        .bind(&json)
        .bind(Utc::now().to_rfc3339())
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a document. Returns false if there was nothing to delete.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    struct TestContext {
        storage: DocumentStorage,
        _temp_dir: TempDir,
    }

    async fn setup() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let storage = DocumentStorage::open(temp_dir.path()).await.unwrap();
        TestContext {
            storage,
            _temp_dir: temp_dir,
        }
    }

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_open_creates_table() {
        let ctx = setup().await;
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%'",
        )
        .fetch_all(&ctx.storage.pool)
        .await
        .unwrap();
        assert_eq!(tables, vec![("documents".to_string(),)]);
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let ctx = setup().await;
        let storage = &ctx.storage;

        let id = storage
            .create("featuredGames", &fields(json!({"title": "Chess", "rating": 4.5})))
            .await
            .unwrap();
        assert!(Uuid::parse_str(&id).is_ok());

        let doc = storage.get("featuredGames", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["title"], "Chess");
        assert_eq!(doc.fields["rating"], 4.5);

        // Collections are separate namespaces.
        assert!(storage.get("news", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let ctx = setup().await;
        let storage = &ctx.storage;
        for title in ["b", "c", "a"] {
            storage
                .create("about", &fields(json!({"docs": title})))
                .await
                .unwrap();
        }
        storage
            .create("news", &fields(json!({"title": "other"})))
            .await
            .unwrap();

        let docs = storage.list("about", None).await.unwrap();
        let titles: Vec<_> = docs.iter().map(|d| d.fields["docs"].clone()).collect();
        assert_eq!(titles, vec![json!("b"), json!("c"), json!("a")]);
    }

    #[tokio::test]
    async fn test_list_with_order() {
        let ctx = setup().await;
        let storage = &ctx.storage;
        storage
            .create("news", &fields(json!({"title": "old", "updatedAt": "2024-01-01T00:00:00Z"})))
            .await
            .unwrap();
        storage
            .create("news", &fields(json!({"title": "undated"})))
            .await
            .unwrap();
        storage
            .create("news", &fields(json!({"title": "new", "updatedAt": "2024-06-01T00:00:00Z"})))
            .await
            .unwrap();

        let order = ListOrder::parse(Some("updatedAt"), Some("desc")).unwrap();
        let docs = storage.list("news", order.as_ref()).await.unwrap();
        let titles: Vec<_> = docs.iter().map(|d| d.fields["title"].clone()).collect();
        assert_eq!(titles, vec![json!("new"), json!("old"), json!("undated")]);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_all_fields() {
        let ctx = setup().await;
        let storage = &ctx.storage;
        let id = storage
            .create("heroSection", &fields(json!({"title": "A", "videoUrl": "v"})))
            .await
            .unwrap();

        let replaced = storage
            .overwrite("heroSection", &id, &fields(json!({"title": "B"})))
            .await
            .unwrap();
        assert!(replaced);

        let doc = storage.get("heroSection", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields, fields(json!({"title": "B"})));
    }

    #[tokio::test]
    async fn test_overwrite_missing_returns_false() {
        let ctx = setup().await;
        let replaced = ctx
            .storage
            .overwrite("heroSection", "missing", &Fields::new())
            .await
            .unwrap();
        assert!(!replaced);
        assert!(ctx.storage.list("heroSection", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let ctx = setup().await;
        let storage = &ctx.storage;
        let id = storage
            .create("about", &fields(json!({"docs": "x"})))
            .await
            .unwrap();

        assert!(storage.delete("about", &id).await.unwrap());
        assert!(storage.get("about", &id).await.unwrap().is_none());
        assert!(!storage.delete("about", &id).await.unwrap());
    }

    #[test]
    fn test_parse_list_order() {
        assert_eq!(ListOrder::parse(None, None), Ok(None));
        assert_eq!(ListOrder::parse(None, Some("desc")), Ok(None));
        assert_eq!(
            ListOrder::parse(Some("rating"), None),
            Ok(Some(ListOrder {
                field: "rating".to_string(),
                descending: false
            }))
        );
        assert!(
            ListOrder::parse(Some("rating"), Some("DESC"))
                .unwrap()
                .unwrap()
                .descending
        );
        assert!(ListOrder::parse(Some("rating"), Some("sideways")).is_err());
    }
}
