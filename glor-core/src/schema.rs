//! Entity schemas.
//!
//! Every record type declares its collection, its fields (with kind and
//! required-ness) and an optional ordering key once, as a `static`
//! [`EntitySchema`]. Form input is coerced and validated against it, and list
//! snapshots are sorted by it.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::crud::ValidationReason;

/// Field map of a stored document, keyed by wire (camelCase) name.
pub type Fields = Map<String, Value>;

/// How raw form input for a field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, stored verbatim.
    Text,
    /// A finite number. Empty input means 0.
    Number,
    /// One of a fixed set of lowercase options.
    Choice(&'static [&'static str]),
    /// An ISO `YYYY-MM-DD` date, or empty.
    Date,
    /// Set by the write path, never by the form.
    Timestamp,
}

impl FieldKind {
    /// Coerces raw input text into the stored JSON value.
    pub fn coerce(&self, raw: &str) -> Result<Value, ValidationReason> {
        match self {
            FieldKind::Text => Ok(Value::String(raw.to_string())),
            FieldKind::Number => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(Value::from(0));
                }
                let number: f64 = trimmed.parse().map_err(|_| {
                    ValidationReason::InvalidValue(format!("'{}' is not a number", raw))
                })?;
                Number::from_f64(number).map(Value::Number).ok_or_else(|| {
                    ValidationReason::InvalidValue(format!("'{}' is not a finite number", raw))
                })
            }
            FieldKind::Choice(options) => {
                let wanted = raw.trim().to_lowercase();
                options
                    .iter()
                    .find(|option| **option == wanted)
                    .map(|option| Value::String(option.to_string()))
                    .ok_or_else(|| {
                        ValidationReason::InvalidValue(format!(
                            "'{}' must be one of: {}",
                            raw,
                            options.join(", ")
                        ))
                    })
            }
            FieldKind::Date => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(Value::String(String::new()));
                }
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                    .map(|_| Value::String(trimmed.to_string()))
                    .map_err(|_| {
                        ValidationReason::InvalidValue(format!(
                            "'{}' is not a date (expected YYYY-MM-DD)",
                            raw
                        ))
                    })
            }
            FieldKind::Timestamp => Err(ValidationReason::ReadOnly),
        }
    }
}

/// Declaration of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Ordering key for a collection's snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: &'static str,
    pub descending: bool,
}

impl OrderBy {
    pub const fn asc(field: &'static str) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub const fn desc(field: &'static str) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    /// Compares two field maps by this key. Maps without the key sort last
    /// in either direction.
    pub fn compare(&self, a: &Fields, b: &Fields) -> Ordering {
        compare_by_field(self.field, self.descending, a, b)
    }
}

/// Compares two field maps by `field`, treating absent or null values as
/// greater than any present value regardless of direction.
pub fn compare_by_field(field: &str, descending: bool, a: &Fields, b: &Fields) -> Ordering {
    let a = a.get(field).filter(|v| !v.is_null());
    let b = b.get(field).filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ordering = compare_values(a, b);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}

/// Orders two JSON values. Strings that both parse as RFC 3339 timestamps
/// (or both as dates) compare chronologically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => {
            if let (Ok(a), Ok(b)) = (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                return a.cmp(&b);
            }
            if let (Ok(a), Ok(b)) = (
                NaiveDate::parse_from_str(a, "%Y-%m-%d"),
                NaiveDate::parse_from_str(b, "%Y-%m-%d"),
            ) {
                return a.cmp(&b);
            }
            a.cmp(b)
        }
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// Returns true for values a required field may not hold.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Static declaration of a record type.
#[derive(Debug)]
pub struct EntitySchema {
    /// Singular display name, e.g. "game".
    pub name: &'static str,
    /// Store collection name.
    pub collection: &'static str,
    pub fields: &'static [FieldSpec],
    pub order_by: Option<OrderBy>,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name)
    }

    /// Required fields that are empty in `fields`, in declaration order.
    pub fn missing_fields(&self, fields: &Fields) -> Vec<&'static str> {
        self.required_fields()
            .filter(|name| is_empty_value(fields.get(*name)))
            .collect()
    }

    /// Names of the fields a form may set.
    pub fn editable_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|field| field.kind != FieldKind::Timestamp)
            .map(|field| field.name)
    }
}

/// Whether a write creates a new document or overwrites an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Overwrite,
}

/// A record type managed by the CRUD component.
///
/// `Default` is the canonical empty form value.
pub trait Entity: Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static {
    fn schema() -> &'static EntitySchema;

    /// Hook run on the outgoing value right before it is written.
    fn prepare_write(&mut self, _kind: WriteKind, _now: DateTime<Utc>) {}
}

/// Serializes a value into a document field map.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(serde::ser::Error::custom(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Deserializes a document field map into a value.
pub fn from_fields<T: DeserializeOwned>(fields: Fields) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(FieldKind::Number.coerce("4.5").unwrap(), json!(4.5));
        assert_eq!(FieldKind::Number.coerce(" 3 ").unwrap(), json!(3.0));
        assert_eq!(FieldKind::Number.coerce("").unwrap(), json!(0));
        assert!(matches!(
            FieldKind::Number.coerce("abc"),
            Err(ValidationReason::InvalidValue(_))
        ));
        assert!(FieldKind::Number.coerce("inf").is_err());
    }

    #[test]
    fn test_choice_coercion() {
        let kind = FieldKind::Choice(&["draft", "published"]);
        assert_eq!(kind.coerce("Published").unwrap(), json!("published"));
        let err = kind.coerce("archived").unwrap_err();
        assert!(err.to_string().contains("draft, published"));
    }

    #[test]
    fn test_date_coercion() {
        assert_eq!(
            FieldKind::Date.coerce("2024-01-01").unwrap(),
            json!("2024-01-01")
        );
        assert_eq!(FieldKind::Date.coerce("").unwrap(), json!(""));
        assert!(FieldKind::Date.coerce("01/01/2024").is_err());
    }

    #[test]
    fn test_timestamp_is_read_only() {
        assert_eq!(
            FieldKind::Timestamp.coerce("2024-01-01T00:00:00Z"),
            Err(ValidationReason::ReadOnly)
        );
    }

    #[test]
    fn test_is_empty_value() {
        assert!(is_empty_value(None));
        assert!(is_empty_value(Some(&json!(null))));
        assert!(is_empty_value(Some(&json!("   "))));
        assert!(is_empty_value(Some(&json!([]))));
        assert!(!is_empty_value(Some(&json!(0))));
        assert!(!is_empty_value(Some(&json!("x"))));
    }

    #[test]
    fn test_compare_timestamps_chronologically() {
        // Lexicographic order would put the fractional second first.
        let a = json!("2024-01-01T00:00:00.5Z");
        let b = json!("2024-01-01T00:00:00Z");
        assert_eq!(compare_values(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_order_by_puts_missing_last() {
        let order = OrderBy::desc("updatedAt");
        let newer = fields(json!({"updatedAt": "2024-02-01T00:00:00Z"}));
        let older = fields(json!({"updatedAt": "2024-01-01T00:00:00Z"}));
        let missing = fields(json!({}));

        let mut items = vec![missing.clone(), older.clone(), newer.clone()];
        items.sort_by(|a, b| order.compare(a, b));
        assert_eq!(items, vec![newer.clone(), older.clone(), missing.clone()]);

        let order = OrderBy::asc("updatedAt");
        items.sort_by(|a, b| order.compare(a, b));
        assert_eq!(items, vec![older, newer, missing]);
    }

    #[test]
    fn test_missing_fields() {
        static SCHEMA: EntitySchema = EntitySchema {
            name: "thing",
            collection: "things",
            fields: &[
                FieldSpec::required("title", FieldKind::Text),
                FieldSpec::optional("note", FieldKind::Text),
                FieldSpec::required("when", FieldKind::Date),
            ],
            order_by: None,
        };

        let value = fields(json!({"title": "", "note": "", "when": ""}));
        assert_eq!(SCHEMA.missing_fields(&value), vec!["title", "when"]);

        let value = fields(json!({"title": "x", "note": "", "when": "2024-01-01"}));
        assert!(SCHEMA.missing_fields(&value).is_empty());
    }
}
