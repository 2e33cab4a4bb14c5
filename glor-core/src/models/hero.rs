use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::{Entity, EntitySchema, FieldKind, FieldSpec};

/// Hero section of the landing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroContent {
    pub title: String,
    pub description: String,
    pub video_url: String,
}

static HERO_SCHEMA: EntitySchema = EntitySchema {
    name: "hero",
    collection: "heroSection",
    fields: &[
        FieldSpec::required("title", FieldKind::Text),
        FieldSpec::required("description", FieldKind::Text),
        FieldSpec::required("videoUrl", FieldKind::Text),
    ],
    order_by: None,
};

impl Entity for HeroContent {
    fn schema() -> &'static EntitySchema {
        &HERO_SCHEMA
    }
}

impl fmt::Display for HeroContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "Video: {}", self.video_url)?;
        if !self.description.is_empty() {
            writeln!(f, "\n{}", self.description)?;
        }
        Ok(())
    }
}
