//! Entry triage: decide per category which unread entries a human should see.
//!
//! - [`rules`] - data-driven skip predicates (host/path patterns, age)
//! - [`sampler`] - bounded uniform sample of the entries no rule skipped
//! - [`engine`] - runs both against a [`FeedSource`](crate::miniflux::FeedSource)
//!   and submits one mark-read batch per category

mod engine;
mod rules;
mod sampler;

pub use engine::{
    decide, CategoryError, CategoryPolicy, CategoryReport, Decisions, Outcome, TriageEngine,
};
pub use rules::{Rule, RuleError, RuleSet, Verdict};
pub use sampler::{sample, Sample};
