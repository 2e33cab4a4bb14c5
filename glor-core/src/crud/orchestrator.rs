use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::{CrudError, ValidationError};
use super::form::{FormMode, FormState};
use super::list::ListSync;
use crate::record::{Record, Snapshot};
use crate::schema::{to_fields, Entity, EntitySchema, WriteKind};
use crate::store::{RecordStore, StoreError};
use crate::subscription::Unsubscribe;

/// Add/edit/save/remove/cancel for one record type.
///
/// Writes never patch the local snapshot. Each successful write is followed
/// by a refresh from the store. Only one write may be in flight per
/// controller; overlapping calls get [`CrudError::Busy`].
pub struct Crud<T> {
    store: Arc<dyn RecordStore>,
    form: Mutex<FormState<T>>,
    list: ListSync<T>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the write ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: Entity> Crud<T> {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            list: ListSync::new(Arc::clone(&store)),
            store,
            form: Mutex::new(FormState::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn schema(&self) -> &'static EntitySchema {
        T::schema()
    }

    /// Validates the form and creates a new record from it. Returns the new
    /// record's id.
    ///
    /// The form is reset only once the store has accepted the write, so a
    /// failed create keeps what the user typed.
    pub async fn add(&self) -> Result<String, CrudError> {
        let _guard = self.begin()?;
        let schema = T::schema();

        let mut data = {
            let form = self.form();
            form.validate()?;
            form.buffer().clone()
        };
        data.prepare_write(WriteKind::Create, Utc::now());
        let fields = to_fields(&data).map_err(|e| StoreError::Decode(e.to_string()))?;

        let id = self
            .store
            .create(schema.collection, fields)
            .await
            .inspect_err(|e| tracing::warn!("Failed to create {}: {}", schema.name, e))?;
        tracing::info!("Created {} {}", schema.name, id);

        self.form().reset();
        self.list.refresh().await?;
        Ok(id)
    }

    /// Overwrites the record the form is bound to with the whole buffer.
    pub async fn save(&self) -> Result<(), CrudError> {
        let _guard = self.begin()?;
        let schema = T::schema();

        let (id, mut data) = {
            let form = self.form();
            let id = form.target().ok_or(CrudError::NotEditing)?.to_string();
            form.validate()?;
            (id, form.buffer().clone())
        };
        data.prepare_write(WriteKind::Overwrite, Utc::now());
        let fields = to_fields(&data).map_err(|e| StoreError::Decode(e.to_string()))?;

        self.store
            .overwrite(schema.collection, &id, fields)
            .await
            .inspect_err(|e| tracing::warn!("Failed to save {} {}: {}", schema.name, id, e))?;
        tracing::info!("Saved {} {}", schema.name, id);

        self.form().reset();
        self.list.refresh().await?;
        Ok(())
    }

    /// Deletes a record and refreshes. Confirmation is up to the caller.
    pub async fn remove(&self, id: &str) -> Result<(), CrudError> {
        let _guard = self.begin()?;
        let schema = T::schema();

        self.store
            .delete(schema.collection, id)
            .await
            .inspect_err(|e| tracing::warn!("Failed to delete {} {}: {}", schema.name, id, e))?;
        tracing::info!("Deleted {} {}", schema.name, id);

        self.list.refresh().await?;
        Ok(())
    }

    /// Drops the draft and returns to create mode.
    pub fn cancel(&self) {
        self.form().reset();
    }

    /// Starts editing a record already in hand.
    pub fn edit(&self, record: &Record<T>) {
        self.form().load(record);
    }

    /// Fetches a record by id and starts editing it. If the fetch fails the
    /// form is left as it was.
    pub async fn edit_by_id(&self, id: &str) -> Result<Record<T>, CrudError> {
        let record = self.get(id).await?;
        self.form().load(&record);
        Ok(record)
    }

    /// Fetches a single record.
    pub async fn get(&self, id: &str) -> Result<Record<T>, CrudError> {
        let document = self.store.get(T::schema().collection, id).await?;
        Ok(Record::from_document(document)?)
    }

    pub fn set_field(&self, name: &str, raw: &str) -> Result<(), ValidationError> {
        self.form().set_field(name, raw)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.form().validate()
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.form().missing_fields()
    }

    pub fn is_editing(&self) -> bool {
        self.form().is_editing()
    }

    pub fn mode(&self) -> FormMode {
        self.form().mode().clone()
    }

    /// Copy of the current draft.
    pub fn buffer(&self) -> T {
        self.form().buffer().clone()
    }

    /// Returns true while a write is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn refresh(&self) -> Result<Snapshot<T>, StoreError> {
        self.list.refresh().await
    }

    pub async fn subscribe<F>(&self, on_change: F) -> Result<Unsubscribe, StoreError>
    where
        F: Fn(Snapshot<T>) + Send + Sync + 'static,
    {
        self.list.subscribe(on_change).await
    }

    /// See [`ListSync::subscribe_with_errors`].
    pub async fn subscribe_with_errors<F, E>(
        &self,
        on_change: F,
        on_error: E,
    ) -> Result<Unsubscribe, StoreError>
    where
        F: Fn(Snapshot<T>) + Send + Sync + 'static,
        E: Fn(StoreError) + Send + Sync + 'static,
    {
        self.list.subscribe_with_errors(on_change, on_error).await
    }

    pub fn current(&self) -> Snapshot<T> {
        self.list.current()
    }

    fn begin(&self) -> Result<InFlight<'_>, CrudError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(&self.in_flight))
            .map_err(|_| CrudError::Busy)
    }

    fn form(&self) -> MutexGuard<'_, FormState<T>> {
        self.form.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
