//! Concurrency-bounded exchange runner.
//!
//! Runs one `SymbolAttempt` per unique catalog symbol on a private
//! rayon::ThreadPool (not the global pool). Exactly `concurrency` worker loops
//! pull symbols from a shared cursor, so no more than `concurrency` attempts
//! are ever in flight and no symbol is attempted twice. Each worker pauses for
//! a randomized inter-symbol delay between consecutive symbols.
//!
//! The runner is a barrier: `run` returns only after every worker has stopped,
//! which is what lets reconciliation mutate the catalog without contention.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use barsync_core::data::{DataProvider, FetchWindow};
use barsync_core::{ArtifactStore, Catalog, JitterSeeds, RewriteRule};
use thiserror::Error;
use tracing::{info, warn};

use crate::attempt::{SymbolAttempt, SymbolResult, SymbolStatus};
use crate::backoff::{BackoffPolicy, WaitWindow};
use crate::events::EventSink;
use crate::sleeper::Sleeper;

/// Errors that prevent an exchange run from starting.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Terminal results of one exchange run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRun {
    /// One result per completed symbol, in completion order.
    pub results: Vec<SymbolResult>,
    /// True if cancellation stopped the run before every symbol finished.
    pub cancelled: bool,
}

/// Schedules symbol attempts for one exchange under a fixed concurrency budget.
pub struct ExchangeRunner<'a> {
    pub provider: &'a dyn DataProvider,
    pub artifacts: &'a dyn ArtifactStore,
    pub sleeper: &'a dyn Sleeper,
    pub policy: BackoffPolicy,
    pub pacing: WaitWindow,
    pub seeds: JitterSeeds,
    pub window: FetchWindow,
    pub events: Option<&'a dyn EventSink>,
    pub cancel: Option<&'a AtomicBool>,
}

impl ExchangeRunner<'_> {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// Attempt every unique symbol in `catalog` with at most `concurrency` in flight.
    pub fn run(
        &self,
        catalog: &Catalog,
        rewrite: Option<&RewriteRule>,
        concurrency: usize,
    ) -> Result<ExchangeRun, RunnerError> {
        let symbols = catalog.unique_symbols();
        if symbols.is_empty() {
            return Ok(ExchangeRun {
                results: Vec::new(),
                cancelled: self.is_cancelled(),
            });
        }

        let workers = concurrency.clamp(1, symbols.len());
        let exchange = catalog.exchange.as_str();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name({
                let exchange = exchange.to_string();
                move |i| format!("barsync-{exchange}-{i}")
            })
            .build()
            .map_err(|e| RunnerError::ThreadPool(e.to_string()))?;

        let attempt = SymbolAttempt {
            exchange,
            window: self.window,
            provider: self.provider,
            artifacts: self.artifacts,
            policy: &self.policy,
            rewrite,
            sleeper: self.sleeper,
            cancel: self.cancel,
        };

        let cursor = AtomicUsize::new(0);
        let results = Mutex::new(Vec::with_capacity(symbols.len()));
        let interrupted = AtomicBool::new(false);

        pool.scope(|s| {
            for worker in 0..workers {
                let (attempt, symbols, cursor, results, interrupted) =
                    (&attempt, &symbols, &cursor, &results, &interrupted);
                s.spawn(move |_| {
                    self.worker_loop(worker, attempt, symbols, cursor, results, interrupted)
                });
            }
        });

        let results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        let cancelled = interrupted.load(Ordering::Relaxed) || results.len() < symbols.len();
        if cancelled {
            warn!(
                exchange,
                completed = results.len(),
                total = symbols.len(),
                "exchange run cancelled; unfinished symbols discarded"
            );
        }

        Ok(ExchangeRun { results, cancelled })
    }

    fn worker_loop(
        &self,
        worker: usize,
        attempt: &SymbolAttempt<'_>,
        symbols: &[&str],
        cursor: &AtomicUsize,
        results: &Mutex<Vec<SymbolResult>>,
        interrupted: &AtomicBool,
    ) {
        let mut pacing_rng = self.seeds.rng_for_worker(attempt.exchange, worker);
        let mut first = true;

        loop {
            if self.is_cancelled() {
                interrupted.store(true, Ordering::Relaxed);
                return;
            }

            let index = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(symbol) = symbols.get(index).copied() else {
                return;
            };

            if !first {
                self.sleeper.sleep(self.pacing.sample(&mut pacing_rng));
            }
            first = false;

            let mut rng = self.seeds.rng_for(attempt.exchange, symbol);
            let Some(result) = attempt.run(symbol, &mut rng) else {
                interrupted.store(true, Ordering::Relaxed);
                return;
            };

            log_result(attempt.exchange, &result);
            if let Some(events) = self.events {
                events.symbol_finished(attempt.exchange, &result);
            }
            results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(result);
        }
    }
}

fn log_result(exchange: &str, result: &SymbolResult) {
    let calls = result.fetch_calls;
    match result.status {
        SymbolStatus::Success => match &result.rewritten_from {
            Some(from) => info!(exchange, symbol = %result.symbol, from = %from, calls, "fetched via rewrite"),
            None => info!(exchange, symbol = %result.symbol, calls, "fetched"),
        },
        SymbolStatus::NoData => info!(exchange, symbol = %result.symbol, calls, "no data in range"),
        SymbolStatus::NotFound => warn!(exchange, symbol = %result.symbol, calls, "symbol not found"),
        SymbolStatus::Failed => warn!(
            exchange,
            symbol = %result.symbol,
            calls,
            error = result.detail.as_deref().unwrap_or("unknown"),
            "symbol failed"
        ),
    }
}
