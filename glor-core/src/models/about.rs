use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::{Entity, EntitySchema, FieldKind, FieldSpec};

/// A block of text on the "about" page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AboutBlock {
    pub docs: String,
    pub description: String,
}

static ABOUT_SCHEMA: EntitySchema = EntitySchema {
    name: "about",
    collection: "about",
    fields: &[
        FieldSpec::required("docs", FieldKind::Text),
        FieldSpec::required("description", FieldKind::Text),
    ],
    order_by: None,
};

impl Entity for AboutBlock {
    fn schema() -> &'static EntitySchema {
        &ABOUT_SCHEMA
    }
}

impl fmt::Display for AboutBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.docs)?;
        writeln!(f, "{}", self.description)
    }
}
