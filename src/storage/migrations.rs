//! Ordered schema history and the reconciler that decides what still has to run.
//!
//! The desired history is append-only: new statements go at the end, and
//! statements already shipped are never edited. Every statement is guarded
//! (`IF NOT EXISTS`) so running it a second time is harmless. That matters in
//! one rare case: a store without transactional DDL executes a statement and
//! then fails to record it. SQLite commits both in one transaction; anything
//! else needs manual repair of the `migration` table.

use thiserror::Error;

/// Schema statements in the order they must be applied.
pub const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS category (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL
)"#,
    r#"CREATE TABLE IF NOT EXISTS feed (
    id INTEGER PRIMARY KEY,
    category_id INTEGER NOT NULL REFERENCES category(id),
    site_url TEXT NOT NULL,
    feed_url TEXT NOT NULL,
    title TEXT NOT NULL
)"#,
    r#"CREATE TABLE IF NOT EXISTS entry (
    id INTEGER PRIMARY KEY,
    feed_id INTEGER NOT NULL REFERENCES feed(id),
    updated INTEGER NOT NULL,
    rating TEXT NOT NULL CHECK (rating IN ('not_opened', 'only_comments', 'not_finished', 'finished')),
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    content TEXT NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_feed_category ON feed(category_id)",
    "CREATE INDEX IF NOT EXISTS idx_entry_feed_rating ON entry(feed_id, rating)",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    /// The store has recorded more statements than this build knows about.
    #[error(
        "Schema is ahead of this build: {applied} migrations applied, only {desired} known"
    )]
    SchemaAhead { desired: usize, applied: usize },

    /// A statement already applied differs from the one at the same position.
    #[error("Migration {position} was changed after it was applied: expected {desired:?}, found {applied:?}")]
    SchemaDiverged {
        position: usize,
        desired: String,
        applied: String,
    },
}

/// Compare the desired history against what the store recorded.
///
/// `applied` must be a statement-for-statement prefix of `desired`. On
/// success the returned slice holds the statements still to apply, in order.
pub fn reconcile<'a, D, A>(desired: &'a [D], applied: &[A]) -> Result<&'a [D], MigrationError>
where
    D: AsRef<str>,
    A: AsRef<str>,
{
    if desired.len() < applied.len() {
        return Err(MigrationError::SchemaAhead {
            desired: desired.len(),
            applied: applied.len(),
        });
    }

    for (position, (want, have)) in desired.iter().zip(applied).enumerate() {
        if want.as_ref() != have.as_ref() {
            return Err(MigrationError::SchemaDiverged {
                position,
                desired: want.as_ref().to_string(),
                applied: have.as_ref().to_string(),
            });
        }
    }

    Ok(&desired[applied.len()..])
}
