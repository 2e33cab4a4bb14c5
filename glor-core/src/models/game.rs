use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::{Entity, EntitySchema, FieldKind, FieldSpec};

/// Game genres shown on the site.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Action,
    Strategy,
    Puzzle,
    Adventure,
}

impl Category {
    pub const NAMES: &'static [&'static str] = &["action", "strategy", "puzzle", "adventure"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Action => "action",
            Category::Strategy => "strategy",
            Category::Puzzle => "puzzle",
            Category::Adventure => "adventure",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A featured game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Game {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub category: Category,
    pub rating: f64,
    /// ISO date, `YYYY-MM-DD`
    pub release_date: String,
}

static GAME_SCHEMA: EntitySchema = EntitySchema {
    name: "game",
    collection: "featuredGames",
    fields: &[
        FieldSpec::required("title", FieldKind::Text),
        FieldSpec::required("description", FieldKind::Text),
        FieldSpec::required("imageUrl", FieldKind::Text),
        FieldSpec::required("category", FieldKind::Choice(Category::NAMES)),
        FieldSpec::required("rating", FieldKind::Number),
        FieldSpec::required("releaseDate", FieldKind::Date),
    ],
    order_by: None,
};

impl Entity for Game {
    fn schema() -> &'static EntitySchema {
        &GAME_SCHEMA
    }
}

impl Game {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = url.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_release_date(mut self, date: impl Into<String>) -> Self {
        self.release_date = date.into();
        self
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "=".repeat(self.title.chars().count()))?;
        writeln!(f, "Category: {}", self.category)?;
        writeln!(f, "Rating: {}", self.rating)?;
        if !self.release_date.is_empty() {
            writeln!(f, "Released: {}", self.release_date)?;
        }
        if !self.image_url.is_empty() {
            writeln!(f, "Image: {}", self.image_url)?;
        }
        if !self.description.is_empty() {
            writeln!(f, "\n{}", self.description)?;
        }
        Ok(())
    }
}
