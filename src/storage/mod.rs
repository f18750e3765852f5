mod catalog;
mod migrations;
mod ratings;
mod report;
mod schema;
mod types;

pub use migrations::{reconcile, MigrationError, MIGRATIONS};
pub use schema::Database;
pub use types::{DatabaseError, Summary};
