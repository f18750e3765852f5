use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

use super::rules::{RuleSet, Verdict};
use super::sampler::sample;
use crate::miniflux::{FeedSource, MinifluxError};

/// Category-scoped failures. They end the category's work for this cycle
/// and never affect other categories.
#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("Could not fetch unread entries: {0}")]
    Fetch(#[source] MinifluxError),
    #[error("Could not mark entries read: {0}")]
    Update(#[source] MinifluxError),
}

/// Triage settings for one category.
#[derive(Debug, Clone)]
pub struct CategoryPolicy {
    pub category_id: i64,
    /// Maximum number of entries left unread for a human per cycle.
    pub keep_limit: usize,
    pub rules: RuleSet,
}

/// How a category's cycle ended.
#[derive(Debug)]
pub enum Outcome {
    /// Nothing needed marking read.
    NothingToSkip,
    /// The skip batch was accepted.
    MarkedRead,
    /// Fetching or marking failed; no decisions were committed.
    Failed(CategoryError),
}

/// Per-category result of one triage cycle.
///
/// `skipped + kept + unparseable == fetched` always holds. When the
/// outcome is `Failed` after a successful fetch, the counts describe the
/// decisions that were attempted but not applied.
#[derive(Debug)]
pub struct CategoryReport {
    pub category_id: i64,
    pub fetched: usize,
    pub skipped: usize,
    pub kept: usize,
    pub unparseable: usize,
    pub outcome: Outcome,
}

impl CategoryReport {
    fn failed(category_id: i64, error: CategoryError) -> Self {
        Self {
            category_id,
            fetched: 0,
            skipped: 0,
            kept: 0,
            unparseable: 0,
            outcome: Outcome::Failed(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }
}

/// Decisions for one category before anything is submitted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decisions {
    pub skip: Vec<i64>,
    pub keep: Vec<i64>,
    pub unparseable: Vec<i64>,
}

/// Classify `entries` with `policy` and cap the keepers at the policy's limit.
///
/// Pure apart from the injected random source.
pub fn decide<R: Rng + ?Sized>(
    policy: &CategoryPolicy,
    entries: &[crate::domain::Entry],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Decisions {
    let mut skip = Vec::new();
    let mut candidates = Vec::new();
    let mut unparseable = Vec::new();

    for entry in entries {
        match policy.rules.evaluate(entry, now) {
            Ok(Verdict::Skip) => skip.push(entry.id),
            Ok(Verdict::Keep) => candidates.push(entry.id),
            Err(e) => {
                tracing::warn!(
                    category_id = policy.category_id,
                    entry_id = entry.id,
                    error = %e,
                    "Excluding entry from this cycle"
                );
                unparseable.push(entry.id);
            }
        }
    }

    let sampled = sample(candidates, policy.keep_limit, rng);
    skip.extend(sampled.overflow);

    Decisions {
        skip,
        keep: sampled.keep,
        unparseable,
    }
}

/// Runs triage cycles over a fixed set of categories.
pub struct TriageEngine<S> {
    source: Arc<S>,
    policies: Vec<CategoryPolicy>,
}

impl<S: FeedSource> TriageEngine<S> {
    pub fn new(source: Arc<S>, policies: Vec<CategoryPolicy>) -> Self {
        Self { source, policies }
    }

    pub fn policies(&self) -> &[CategoryPolicy] {
        &self.policies
    }

    /// Run one cycle over every configured category.
    ///
    /// Categories run concurrently, each with its own random source seeded
    /// from `rng`. Reports are returned in configuration order.
    pub async fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<CategoryReport> {
        self.run_at(Utc::now(), rng).await
    }

    /// Like [`run`](Self::run) with an explicit clock.
    pub async fn run_at<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<CategoryReport> {
        let tasks = self.policies.iter().map(|policy| {
            let mut category_rng = StdRng::seed_from_u64(rng.gen());
            let span = tracing::info_span!("category", category_id = policy.category_id);
            async move { self.run_category(policy, now, &mut category_rng).await }.instrument(span)
        });

        join_all(tasks).await
    }

    async fn run_category(
        &self,
        policy: &CategoryPolicy,
        now: DateTime<Utc>,
        rng: &mut StdRng,
    ) -> CategoryReport {
        let category_id = policy.category_id;

        let entries = match self.source.list_unread(category_id).await {
            Ok(entries) => entries,
            Err(e) => {
                let error = CategoryError::Fetch(e);
                tracing::error!(error = %error, "Skipping category for this cycle");
                return CategoryReport::failed(category_id, error);
            }
        };

        if entries.is_empty() {
            tracing::info!("No unread entries found");
            return CategoryReport {
                category_id,
                fetched: 0,
                skipped: 0,
                kept: 0,
                unparseable: 0,
                outcome: Outcome::NothingToSkip,
            };
        }
        tracing::info!(count = entries.len(), "Unread entries found");

        let decisions = decide(policy, &entries, now, rng);
        let mut report = CategoryReport {
            category_id,
            fetched: entries.len(),
            skipped: decisions.skip.len(),
            kept: decisions.keep.len(),
            unparseable: decisions.unparseable.len(),
            outcome: Outcome::NothingToSkip,
        };

        if decisions.skip.is_empty() {
            tracing::info!(kept = report.kept, "All entries will be kept");
            return report;
        }

        match self.source.mark_read(&decisions.skip).await {
            Ok(()) => {
                tracing::info!(
                    kept = report.kept,
                    marked_read = report.skipped,
                    unparseable = report.unparseable,
                    "Entries processed"
                );
                report.outcome = Outcome::MarkedRead;
            }
            Err(e) => {
                let error = CategoryError::Update(e);
                tracing::error!(
                    error = %error,
                    batch = decisions.skip.len(),
                    "Decisions not applied this cycle"
                );
                report.outcome = Outcome::Failed(error);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Entry;
    use crate::triage::rules::Rule;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn entry(id: i64, url: &str, age_hours: i64) -> Entry {
        Entry {
            id,
            feed_id: 1,
            title: format!("Entry {id}"),
            url: url.to_string(),
            content: String::new(),
            published_at: now() - Duration::hours(age_hours),
        }
    }

    /// In-memory feed source that records every mark-read batch.
    #[derive(Default)]
    struct FakeSource {
        unread: HashMap<i64, Vec<Entry>>,
        failing_fetch: HashSet<i64>,
        failing_update: bool,
        batches: Mutex<Vec<Vec<i64>>>,
    }

    #[async_trait]
    impl FeedSource for FakeSource {
        async fn list_unread(&self, category_id: i64) -> Result<Vec<Entry>, MinifluxError> {
            if self.failing_fetch.contains(&category_id) {
                return Err(MinifluxError::HttpStatus(500));
            }
            Ok(self.unread.get(&category_id).cloned().unwrap_or_default())
        }

        async fn mark_read(&self, entry_ids: &[i64]) -> Result<(), MinifluxError> {
            if self.failing_update {
                return Err(MinifluxError::HttpStatus(503));
            }
            self.batches.lock().unwrap().push(entry_ids.to_vec());
            Ok(())
        }
    }

    fn video_policy(keep_limit: usize) -> CategoryPolicy {
        CategoryPolicy {
            category_id: 2,
            keep_limit,
            rules: RuleSet::new(vec![
                Rule::HostPathPrefix {
                    host: "www.youtube.com".to_string(),
                    prefix: "/shorts".to_string(),
                },
                Rule::MaxAge(Duration::hours(48)),
            ]),
        }
    }

    fn plain_policy(category_id: i64, keep_limit: usize) -> CategoryPolicy {
        CategoryPolicy {
            category_id,
            keep_limit,
            rules: RuleSet::default(),
        }
    }

    #[test]
    fn test_decide_partitions_by_rules() {
        let entries = vec![
            entry(1, "https://example.com/old", 50),
            entry(2, "https://www.youtube.com/shorts/xyz", 1),
            entry(3, "https://example.com/fresh", 1),
            entry(4, "::not a url::", 1),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let decisions = decide(&video_policy(10), &entries, now(), &mut rng);

        let skip: HashSet<i64> = decisions.skip.into_iter().collect();
        assert_eq!(skip, HashSet::from([1, 2]));
        assert_eq!(decisions.keep, vec![3]);
        assert_eq!(decisions.unparseable, vec![4]);
    }

    #[test]
    fn test_decide_overflow_joins_skip() {
        let entries: Vec<Entry> = (1..=15)
            .map(|id| entry(id, &format!("https://example.com/{id}"), 1))
            .collect();
        let mut rng = StdRng::seed_from_u64(9);
        let decisions = decide(&video_policy(10), &entries, now(), &mut rng);
        assert_eq!(decisions.keep.len(), 10);
        assert_eq!(decisions.skip.len(), 5);
    }

    #[tokio::test]
    async fn test_run_marks_skip_set_in_one_batch() {
        let mut source = FakeSource::default();
        source.unread.insert(
            2,
            vec![
                entry(1, "https://example.com/old", 50),
                entry(2, "https://www.youtube.com/shorts/xyz", 1),
                entry(3, "https://example.com/fresh", 1),
            ],
        );
        let source = Arc::new(source);
        let engine = TriageEngine::new(source.clone(), vec![video_policy(10)]);

        let mut rng = StdRng::seed_from_u64(1);
        let reports = engine.run_at(now(), &mut rng).await;

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.fetched, 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.kept, 1);
        assert!(matches!(report.outcome, Outcome::MarkedRead));

        let batches = source.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let marked: HashSet<i64> = batches[0].iter().copied().collect();
        assert_eq!(marked, HashSet::from([1, 2]));
    }

    #[tokio::test]
    async fn test_nothing_to_skip_makes_no_call() {
        let mut source = FakeSource::default();
        source
            .unread
            .insert(5, vec![entry(1, "https://example.com/a", 1)]);
        let source = Arc::new(source);
        let engine = TriageEngine::new(source.clone(), vec![plain_policy(5, 10)]);

        let reports = engine.run_at(now(), &mut StdRng::seed_from_u64(1)).await;
        assert!(matches!(reports[0].outcome, Outcome::NothingToSkip));
        assert_eq!(reports[0].kept, 1);
        assert!(source.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let mut source = FakeSource::default();
        source.failing_fetch.insert(1);
        source.unread.insert(
            2,
            (10..25)
                .map(|id| entry(id, &format!("https://example.com/{id}"), 1))
                .collect(),
        );
        let source = Arc::new(source);
        let engine = TriageEngine::new(
            source.clone(),
            vec![plain_policy(1, 10), plain_policy(2, 10)],
        );

        let reports = engine.run_at(now(), &mut StdRng::seed_from_u64(2)).await;

        assert_eq!(reports[0].category_id, 1);
        assert!(matches!(
            reports[0].outcome,
            Outcome::Failed(CategoryError::Fetch(_))
        ));
        assert_eq!(reports[0].fetched, 0);

        assert_eq!(reports[1].category_id, 2);
        assert_eq!(reports[1].fetched, 15);
        assert_eq!(reports[1].kept, 10);
        assert_eq!(reports[1].skipped, 5);
        assert!(matches!(reports[1].outcome, Outcome::MarkedRead));

        // Only category 2's entries were ever submitted
        let batches = source.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert!(batches[0].iter().all(|id| (10..25).contains(id)));
    }

    #[tokio::test]
    async fn test_update_failure_reported_as_failed() {
        let mut source = FakeSource::default();
        source.failing_update = true;
        source
            .unread
            .insert(2, vec![entry(1, "https://example.com/old", 100)]);
        let engine = TriageEngine::new(Arc::new(source), vec![video_policy(10)]);

        let reports = engine.run_at(now(), &mut StdRng::seed_from_u64(4)).await;
        assert!(matches!(
            reports[0].outcome,
            Outcome::Failed(CategoryError::Update(_))
        ));
        assert!(reports[0].is_failed());
        assert_eq!(reports[0].skipped, 1);
    }

    #[tokio::test]
    async fn test_repeated_runs_yield_same_counts() {
        let mut source = FakeSource::default();
        let mut entries: Vec<Entry> = (1..=20)
            .map(|id| entry(id, &format!("https://example.com/{id}"), 1))
            .collect();
        entries.push(entry(100, "https://www.youtube.com/shorts/a", 1));
        source.unread.insert(2, entries);
        let engine = TriageEngine::new(Arc::new(source), vec![video_policy(10)]);

        let first = engine.run_at(now(), &mut StdRng::seed_from_u64(10)).await;
        let second = engine.run_at(now(), &mut StdRng::seed_from_u64(99)).await;

        assert_eq!(first[0].fetched, second[0].fetched);
        assert_eq!(first[0].skipped, second[0].skipped);
        assert_eq!(first[0].kept, second[0].kept);
        assert_eq!(first[0].skipped + first[0].kept, first[0].fetched);
    }
}
