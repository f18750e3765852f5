//! Core data types shared by the triage engine, the Miniflux client and the
//! rating store.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A Miniflux category. Categories to triage come from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub title: String,
}

/// A subscribed feed, owned by exactly one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: i64,
    pub category_id: i64,
    pub feed_url: String,
    pub site_url: String,
    pub title: String,
}

/// An unread feed entry as fetched for one triage cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
}

/// How far a human got with an entry they were shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rating {
    NotOpened,
    OnlyComments,
    NotFinished,
    Finished,
}

impl Rating {
    /// All ratings in display order.
    pub const ALL: [Rating; 4] = [
        Rating::NotOpened,
        Rating::OnlyComments,
        Rating::NotFinished,
        Rating::Finished,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::NotOpened => "not_opened",
            Rating::OnlyComments => "only_comments",
            Rating::NotFinished => "not_finished",
            Rating::Finished => "finished",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown rating '{0}' (expected one of: not_opened, only_comments, not_finished, finished)")]
pub struct UnknownRating(pub String);

impl FromStr for Rating {
    type Err = UnknownRating;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rating::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| UnknownRating(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_parses_every_name() {
        for rating in Rating::ALL {
            assert_eq!(rating.as_str().parse::<Rating>(), Ok(rating));
        }
    }

    #[test]
    fn test_rating_rejects_unknown_name() {
        let err = "loved_it".parse::<Rating>().unwrap_err();
        assert_eq!(err, UnknownRating("loved_it".to_string()));
        assert!(err.to_string().contains("only_comments"));
    }

    #[test]
    fn test_rating_display_matches_stored_name() {
        assert_eq!(Rating::OnlyComments.to_string(), "only_comments");
    }
}
