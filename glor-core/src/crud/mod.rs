//! Generic CRUD synchronization.
//!
//! One [`Crud`] instance per record type composes a [`FormState`] (the edit
//! buffer and its create/edit mode), a [`ListSync`] (the last known
//! collection snapshot) and a [`RecordStore`](crate::store::RecordStore).
//! Every write is followed by a full refresh instead of a local patch.

mod error;
mod form;
mod list;
mod orchestrator;

pub use error::{CrudError, ValidationError, ValidationReason};
pub use form::{FormMode, FormState};
pub use list::ListSync;
pub use orchestrator::Crud;

#[cfg(test)]
pub(crate) mod testing;
