use serde_json::Value;

use super::error::{ValidationError, ValidationReason};
use crate::record::Record;
use crate::schema::{from_fields, to_fields, Entity, Fields};

/// Whether the form will create a new record or overwrite an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Creating,
    /// Bound to the id of the record being edited.
    Editing(String),
}

/// Edit buffer for one record type.
///
/// Starts in [`FormMode::Creating`] with the entity's defaults. `load`
/// switches to editing, `reset` switches back. Nothing else changes the
/// mode.
#[derive(Debug, Clone)]
pub struct FormState<T> {
    buffer: T,
    mode: FormMode,
}

impl<T: Entity> Default for FormState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> FormState<T> {
    pub fn new() -> Self {
        Self {
            buffer: T::default(),
            mode: FormMode::Creating,
        }
    }

    /// Enters edit mode for `record`, copying all of its fields.
    pub fn load(&mut self, record: &Record<T>) {
        self.buffer = record.data.clone();
        self.mode = FormMode::Editing(record.id.clone());
    }

    /// Enters create mode with schema defaults.
    pub fn reset(&mut self) {
        self.buffer = T::default();
        self.mode = FormMode::Creating;
    }

    /// Sets one field from raw input, applying the schema's coercion.
    ///
    /// On error the buffer is left untouched.
    pub fn set_field(&mut self, name: &str, raw: &str) -> Result<(), ValidationError> {
        let spec = T::schema()
            .field(name)
            .ok_or_else(|| ValidationError::new(name, ValidationReason::UnknownField))?;
        let value = spec
            .kind
            .coerce(raw)
            .map_err(|reason| ValidationError::new(name, reason))?;

        let mut fields = self.fields()?;
        fields.insert(spec.name.to_string(), value);
        self.buffer = from_fields(fields).map_err(|e| {
            ValidationError::new(name, ValidationReason::InvalidValue(e.to_string()))
        })?;
        Ok(())
    }

    /// Checks required fields, reporting the first empty one in declaration
    /// order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.missing_fields().first() {
            Some(field) => Err(ValidationError::required(*field)),
            None => Ok(()),
        }
    }

    /// Every required field that is currently empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        match self.fields() {
            Ok(fields) => T::schema().missing_fields(&fields),
            Err(_) => T::schema().required_fields().collect(),
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, FormMode::Editing(_))
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    /// Id of the record being edited, if any.
    pub fn target(&self) -> Option<&str> {
        match &self.mode {
            FormMode::Editing(id) => Some(id),
            FormMode::Creating => None,
        }
    }

    pub fn buffer(&self) -> &T {
        &self.buffer
    }

    /// Current value of one field in wire form.
    pub fn field_value(&self, name: &str) -> Option<Value> {
        self.fields().ok()?.remove(name)
    }

    fn fields(&self) -> Result<Fields, ValidationError> {
        to_fields(&self.buffer).map_err(|e| {
            ValidationError::new(
                T::schema().name,
                ValidationReason::InvalidValue(e.to_string()),
            )
        })
    }
}
