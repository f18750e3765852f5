//! Periodic driver for triage cycles.
//!
//! One cycle runs at a time. Shutdown is observed only between cycles, so a
//! cycle that has started always finishes its mark-read batches (or lets them
//! time out) before the loop exits.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::miniflux::FeedSource;
use crate::triage::{CategoryReport, TriageEngine};

/// Totals over all categories of one cycle, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleTotals {
    pub categories: usize,
    pub failed: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub kept: usize,
}

impl CycleTotals {
    pub fn from_reports(reports: &[CategoryReport]) -> Self {
        reports.iter().fold(
            CycleTotals {
                categories: reports.len(),
                ..Default::default()
            },
            |acc, r| CycleTotals {
                failed: acc.failed + usize::from(r.is_failed()),
                fetched: acc.fetched + r.fetched,
                skipped: acc.skipped + r.skipped,
                kept: acc.kept + r.kept,
                ..acc
            },
        )
    }
}

pub struct Scheduler<S> {
    engine: TriageEngine<S>,
    interval: Duration,
    rng: StdRng,
}

impl<S: FeedSource> Scheduler<S> {
    pub fn new(engine: TriageEngine<S>, interval: Duration) -> Self {
        Self::with_rng(engine, interval, StdRng::from_entropy())
    }

    /// Use a specific random source, e.g. a seeded one in tests.
    pub fn with_rng(engine: TriageEngine<S>, interval: Duration, rng: StdRng) -> Self {
        Self {
            engine,
            interval,
            rng,
        }
    }

    /// Run a single triage cycle over all configured categories.
    pub async fn run_cycle(&mut self) -> Vec<CategoryReport> {
        tracing::info!("Checking unread entries");
        let reports = self.engine.run(&mut self.rng).await;
        let totals = CycleTotals::from_reports(&reports);
        tracing::info!(
            categories = totals.categories,
            failed = totals.failed,
            fetched = totals.fetched,
            skipped = totals.skipped,
            kept = totals.kept,
            "Triage cycle finished"
        );
        reports
    }

    /// Run cycles on every tick until `cancel` fires. The first cycle starts
    /// immediately. Returns the number of cycles completed.
    pub async fn run(&mut self, cancel: &CancellationToken) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0;

        tracing::info!(interval_secs = self.interval.as_secs(), "Starting triage loop");
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!(cycles, "Stopping triage loop");
                    break;
                }

                _ = ticker.tick() => {
                    self.run_cycle().await;
                    cycles += 1;
                }
            }
        }

        cycles
    }
}
