//! feedcull: keeps a Miniflux unread list small enough for a human.
//!
//! Each cycle, every configured category is triaged independently: entries
//! matching a skip rule are marked read, and of the rest only a bounded
//! random sample stays unread. Ratings the human gives to the kept entries
//! land in a SQLite store whose schema is brought up to date at startup.

pub mod config;
pub mod domain;
pub mod miniflux;
pub mod scheduler;
pub mod storage;
pub mod summary;
pub mod triage;
