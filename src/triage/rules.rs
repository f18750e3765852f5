use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use url::Url;

use crate::domain::Entry;

/// Outcome of evaluating a rule set against one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Mark read without showing it to anyone.
    Skip,
    /// Leave unread; the entry joins the retention candidates.
    Keep,
}

/// Entry-scoped failure. The entry is left out of this cycle entirely.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Entry {entry_id} has an unparseable URL '{url}': {source}")]
    UnparseableUrl {
        entry_id: i64,
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// A single skip predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Host matches exactly and the path starts with `prefix`.
    HostPathPrefix { host: String, prefix: String },
    /// Host matches exactly and the path contains `needle`.
    HostPathContains { host: String, needle: String },
    /// Entry was published longer ago than this.
    MaxAge(Duration),
}

impl Rule {
    fn matches(&self, url: &Url, published_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Rule::HostPathPrefix { host, prefix } => {
                url.host_str() == Some(host.as_str()) && url.path().starts_with(prefix.as_str())
            }
            Rule::HostPathContains { host, needle } => {
                url.host_str() == Some(host.as_str()) && url.path().contains(needle.as_str())
            }
            Rule::MaxAge(max_age) => now.signed_duration_since(published_at) > *max_age,
        }
    }
}

/// Ordered collection of skip predicates for one category.
///
/// The verdict is the logical OR of every rule: a single match skips the
/// entry. An empty rule set keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Decide whether `entry` should be skipped at time `now`.
    ///
    /// The URL is parsed before any rule runs, so an unparseable URL is
    /// reported even when an age rule would have matched.
    pub fn evaluate(&self, entry: &Entry, now: DateTime<Utc>) -> Result<Verdict, RuleError> {
        let url = Url::parse(&entry.url).map_err(|source| RuleError::UnparseableUrl {
            entry_id: entry.id,
            url: entry.url.clone(),
            source,
        })?;

        let skip = self
            .rules
            .iter()
            .any(|rule| rule.matches(&url, entry.published_at, now));

        Ok(if skip { Verdict::Skip } else { Verdict::Keep })
    }
}
