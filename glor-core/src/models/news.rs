use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::Record;
use crate::schema::{Entity, EntitySchema, FieldKind, FieldSpec, OrderBy, WriteKind};

/// Publication state of a news article.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsStatus {
    #[default]
    Draft,
    Published,
}

impl NewsStatus {
    pub const NAMES: &'static [&'static str] = &["draft", "published"];
}

impl fmt::Display for NewsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewsStatus::Draft => write!(f, "draft"),
            NewsStatus::Published => write!(f, "published"),
        }
    }
}

/// A news article. `content` is HTML produced by the site's rich-text editor
/// and is stored untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct News {
    pub title: String,
    pub description: String,
    pub cover_image: String,
    pub content: String,
    pub status: NewsStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

static NEWS_SCHEMA: EntitySchema = EntitySchema {
    name: "news",
    collection: "news",
    fields: &[
        FieldSpec::required("title", FieldKind::Text),
        FieldSpec::required("description", FieldKind::Text),
        FieldSpec::optional("coverImage", FieldKind::Text),
        FieldSpec::optional("content", FieldKind::Text),
        FieldSpec::optional("status", FieldKind::Choice(NewsStatus::NAMES)),
        FieldSpec::optional("createdAt", FieldKind::Timestamp),
        FieldSpec::optional("updatedAt", FieldKind::Timestamp),
    ],
    order_by: Some(OrderBy::desc("updatedAt")),
};

impl Entity for News {
    fn schema() -> &'static EntitySchema {
        &NEWS_SCHEMA
    }

    fn prepare_write(&mut self, kind: WriteKind, now: DateTime<Utc>) {
        if kind == WriteKind::Create {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
    }
}

impl News {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Last modification time, falling back to creation time.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }

    pub fn is_published(&self) -> bool {
        self.status == NewsStatus::Published
    }
}

/// Splits articles into (drafts, published), keeping their order.
pub fn split_by_status(items: &[Record<News>]) -> (Vec<&Record<News>>, Vec<&Record<News>>) {
    items.iter().partition(|item| !item.data.is_published())
}

impl fmt::Display for News {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.title.is_empty() {
            "(No title)"
        } else {
            &self.title
        };
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.chars().count()))?;
        writeln!(f, "Status: {}", self.status)?;
        if let Some(created) = self.created_at {
            writeln!(f, "Created: {}", created.format("%Y-%m-%d %H:%M"))?;
        }
        if let Some(updated) = self.updated_at {
            writeln!(f, "Updated: {}", updated.format("%Y-%m-%d %H:%M"))?;
        }
        if !self.cover_image.is_empty() {
            writeln!(f, "Cover: {}", self.cover_image)?;
        }
        if !self.description.is_empty() {
            writeln!(f, "\n{}", self.description)?;
        }
        if !self.content.is_empty() {
            writeln!(f, "\n{}", self.content)?;
        }
        Ok(())
    }
}
