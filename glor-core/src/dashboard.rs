//! Read-only summary of the games collection.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{Category, Game};
use crate::record::Record;

/// How many games the "latest" and "top rated" lists hold.
pub const HIGHLIGHT_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct GamesSummary {
    pub total: usize,
    /// Newest releases first.
    pub latest: Vec<Record<Game>>,
    /// Highest rating first.
    pub top_rated: Vec<Record<Game>>,
    /// Only categories that occur are listed.
    pub by_category: BTreeMap<Category, usize>,
}

impl GamesSummary {
    pub fn from_games(games: &[Record<Game>]) -> Self {
        let mut latest = games.to_vec();
        // Unparseable or empty dates go last.
        latest.sort_by(|a, b| {
            let a = NaiveDate::parse_from_str(&a.data.release_date, "%Y-%m-%d").ok();
            let b = NaiveDate::parse_from_str(&b.data.release_date, "%Y-%m-%d").ok();
            match (a, b) {
                (Some(a), Some(b)) => b.cmp(&a),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
        latest.truncate(HIGHLIGHT_COUNT);

        let mut top_rated = games.to_vec();
        top_rated.sort_by(|a, b| {
            b.data
                .rating
                .partial_cmp(&a.data.rating)
                .unwrap_or(Ordering::Equal)
        });
        top_rated.truncate(HIGHLIGHT_COUNT);

        let mut by_category = BTreeMap::new();
        for game in games {
            *by_category.entry(game.data.category).or_insert(0) += 1;
        }

        Self {
            total: games.len(),
            latest,
            top_rated,
            by_category,
        }
    }
}

impl fmt::Display for GamesSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dashboard")?;
        writeln!(f, "=========\n")?;
        writeln!(f, "Total games: {}", self.total)?;

        if !self.by_category.is_empty() {
            writeln!(f, "\nBy category:")?;
            for (category, count) in &self.by_category {
                writeln!(f, "  {:<10} {}", category, count)?;
            }
        }

        writeln!(f, "\nLatest releases:")?;
        if self.latest.is_empty() {
            writeln!(f, "  No games found.")?;
        }
        for game in &self.latest {
            let date = if game.data.release_date.is_empty() {
                "-"
            } else {
                &game.data.release_date
            };
            writeln!(f, "  {}  {}", date, game.data.title)?;
        }

        writeln!(f, "\nTop rated:")?;
        if self.top_rated.is_empty() {
            writeln!(f, "  No games found.")?;
        }
        for game in &self.top_rated {
            writeln!(f, "  {:>4}  {}", game.data.rating, game.data.title)?;
        }
        Ok(())
    }
}
