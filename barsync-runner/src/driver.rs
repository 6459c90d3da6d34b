//! Exchange pipeline driver: load, run, reconcile, report.
//!
//! Exchanges are pulled from a shared cursor by at most `across_exchanges`
//! scoped threads; each exchange is internally bounded by the exchange runner.
//! A missing or unreadable catalog affects that exchange only.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use barsync_core::data::{DataProvider, FetchWindow};
use barsync_core::{ArtifactStore, CatalogError, CatalogStore, JitterSeeds};
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::backoff::{BackoffPolicy, WaitWindow};
use crate::config::{ExchangeConfig, IngestConfig};
use crate::events::EventSink;
use crate::exchange::ExchangeRunner;
use crate::reconcile::{apply, reconcile};
use crate::report::{ExchangeReport, ExchangeStatus, IngestReport, OutcomeCounts};
use crate::sleeper::{Sleeper, THREAD_SLEEPER};

/// Resolved per-run settings, scoped to one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub window: FetchWindow,
    pub policy: BackoffPolicy,
    pub pacing: WaitWindow,
    pub per_exchange: usize,
    pub across_exchanges: usize,
    pub seeds: JitterSeeds,
}

impl RunSettings {
    /// Resolve settings for a run ending on `today`. Without a configured
    /// jitter seed, a fresh one is drawn from entropy.
    pub fn from_config(config: &IngestConfig, today: NaiveDate) -> Self {
        let seeds = config
            .jitter_seed
            .map_or_else(JitterSeeds::from_entropy, JitterSeeds::new);
        Self {
            window: config.fetch_window(today),
            policy: config.retry.backoff_policy(),
            pacing: config.retry.inter_symbol_delay_ms,
            per_exchange: config.concurrency.per_exchange,
            across_exchanges: config.concurrency.across_exchanges,
            seeds,
        }
    }
}

pub struct PipelineDriver<'a> {
    provider: &'a dyn DataProvider,
    catalogs: &'a dyn CatalogStore,
    artifacts: &'a dyn ArtifactStore,
    sleeper: &'a dyn Sleeper,
    events: Option<&'a dyn EventSink>,
    cancel: Option<&'a AtomicBool>,
    settings: RunSettings,
}

impl<'a> PipelineDriver<'a> {
    pub fn new(
        provider: &'a dyn DataProvider,
        catalogs: &'a dyn CatalogStore,
        artifacts: &'a dyn ArtifactStore,
        settings: RunSettings,
    ) -> Self {
        Self {
            provider,
            catalogs,
            artifacts,
            sleeper: &THREAD_SLEEPER,
            events: None,
            cancel: None,
            settings,
        }
    }

    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_events(mut self, events: &'a dyn EventSink) -> Self {
        self.events = Some(events);
        self
    }

    /// Cooperative stop flag checked before every exchange, symbol and fetch.
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// Process every exchange and return one report entry per exchange, in
    /// the order given.
    pub fn run_all(&self, exchanges: &[ExchangeConfig]) -> IngestReport {
        let started_at = Utc::now();
        info!(
            exchanges = exchanges.len(),
            start = %self.settings.window.start,
            end = %self.settings.window.end,
            seed = self.settings.seeds.master_seed(),
            "ingestion started"
        );

        let workers = self.settings.across_exchanges.clamp(1, exchanges.len().max(1));
        let cursor = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<ExchangeReport>>> = Mutex::new(vec![None; exchanges.len()]);

        std::thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| loop {
                    if self.is_cancelled() {
                        return;
                    }
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(exchange) = exchanges.get(index) else {
                        return;
                    };
                    let report = self.run_exchange(exchange);
                    slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(report);
                });
            }
        });

        let reports = slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .zip(exchanges)
            .map(|(slot, exchange)| {
                slot.unwrap_or_else(|| self.finish(ExchangeReport::cancelled(&exchange.code), None))
            })
            .collect();

        let report = IngestReport {
            started_at,
            finished_at: Utc::now(),
            window: self.settings.window,
            exchanges: reports,
        };
        let totals = report.totals();
        info!(
            success = totals.success,
            not_found = totals.not_found,
            failed = totals.failed,
            no_data = totals.no_data,
            "ingestion finished"
        );
        report
    }

    /// Load, run and reconcile one exchange.
    pub fn run_exchange(&self, exchange: &ExchangeConfig) -> ExchangeReport {
        let started = Instant::now();
        let code = exchange.code.as_str();

        if self.is_cancelled() {
            return self.finish(ExchangeReport::cancelled(code), Some(started));
        }

        let catalog = match self.catalogs.load(code) {
            Ok(catalog) => catalog,
            Err(e @ CatalogError::Missing { .. }) => {
                warn!(exchange = code, error = %e, "no catalog; skipping exchange");
                return self.finish(ExchangeReport::skipped(code, e.to_string()), Some(started));
            }
            Err(e) => {
                warn!(exchange = code, error = %e, "catalog unreadable; aborting exchange");
                return self.finish(ExchangeReport::aborted(code, e.to_string()), Some(started));
            }
        };

        let symbols = catalog.unique_symbols().len();
        info!(
            exchange = code,
            symbols,
            concurrency = self.settings.per_exchange,
            "exchange started"
        );

        let runner = ExchangeRunner {
            provider: self.provider,
            artifacts: self.artifacts,
            sleeper: self.sleeper,
            policy: self.settings.policy,
            pacing: self.settings.pacing,
            seeds: self.settings.seeds,
            window: self.settings.window,
            events: self.events,
            cancel: self.cancel,
        };
        let run = match runner.run(&catalog, exchange.rewrite.as_ref(), self.settings.per_exchange) {
            Ok(run) => run,
            Err(e) => {
                warn!(exchange = code, error = %e, "exchange runner failed to start");
                return self.finish(ExchangeReport::aborted(code, e.to_string()), Some(started));
            }
        };

        // Only completed results reach the catalog; a cancelled run still
        // records what it finished.
        let reconciliation = reconcile(&catalog, &run.results);
        let applied = apply(&reconciliation, self.catalogs, self.artifacts);

        let report = ExchangeReport {
            exchange: code.to_string(),
            status: if run.cancelled {
                ExchangeStatus::Cancelled
            } else {
                ExchangeStatus::Completed
            },
            symbols,
            counts: OutcomeCounts::from_results(&run.results),
            removed: reconciliation.removed,
            renamed: applied.renamed,
            catalog_written: applied.catalog_written,
            catalog_error: applied.catalog_error,
            elapsed_ms: 0,
        };
        self.finish(report, Some(started))
    }

    fn finish(&self, mut report: ExchangeReport, started: Option<Instant>) -> ExchangeReport {
        if let Some(started) = started {
            report.elapsed_ms = started.elapsed().as_millis() as u64;
        }
        info!(
            exchange = %report.exchange,
            status = report.status.label(),
            success = report.counts.success,
            not_found = report.counts.not_found,
            failed = report.counts.failed,
            no_data = report.counts.no_data,
            removed = report.removed.len(),
            renamed = report.renamed.len(),
            elapsed_ms = report.elapsed_ms,
            "exchange finished"
        );
        if let Some(events) = self.events {
            events.exchange_finished(&report);
        }
        report
    }
}
