use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use super::migrations::MigrationError;
use crate::domain::Rating;

// ============================================================================
// Error Types
// ============================================================================

/// Rating store errors with user-facing messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Schema history does not match this build; fatal at startup
    #[error("Database migration failed: {0}")]
    Migration(#[from] MigrationError),

    /// An entry can be rated only once
    #[error("Entry {0} has already been rated")]
    AlreadyRated(i64),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

// ============================================================================
// Reporting
// ============================================================================

/// Aggregated view of every stored rating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total_entries: i64,
    pub by_category: HashMap<i64, i64>,
    pub by_rating: HashMap<Rating, i64>,
    /// category id -> rating -> count, ordered by category id
    pub category_rating: BTreeMap<i64, HashMap<Rating, i64>>,
    pub category_names: HashMap<i64, String>,
}
