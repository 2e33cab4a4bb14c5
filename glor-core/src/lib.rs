//! GlorGames Core Library
//!
//! Entity schemas, the generic CRUD form/list state and the document store
//! clients shared by the GlorGames admin tools.

pub mod crud;
pub mod dashboard;
pub mod identity;
pub mod models;
pub mod record;
pub mod schema;
pub mod store;
pub mod subscription;

pub use crud::{Crud, CrudError, FormMode, FormState, ListSync, ValidationError, ValidationReason};
pub use dashboard::GamesSummary;
pub use identity::{AuthCallback, AuthState, IdentityError, IdentityProvider, Session, User};
pub use models::{AboutBlock, Category, Game, HeroContent, News, NewsStatus};
pub use record::{Document, Record, Snapshot};
pub use schema::{Entity, EntitySchema, FieldKind, FieldSpec, Fields, OrderBy, WriteKind};
pub use store::{MemoryStore, RecordStore, RemoteStore, StoreError, WatchCallback};
pub use subscription::Unsubscribe;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
