//! Symbol fetch attempt: one symbol's bounded retry sequence.
//!
//! Flow per symbol:
//! 1. Fetch and classify, up to `max_attempts` times
//! 2. Success → write the artifact atomically under the final identifier
//! 3. NotFound on the first call → at most one fetch of the rewritten identifier
//! 4. RateLimited / TransientError → wait as the backoff policy says, then loop
//!
//! Failures never escape: every path ends in a `SymbolResult`, or in `None`
//! when the run was cancelled before the attempt could finish.

use std::sync::atomic::{AtomicBool, Ordering};

use barsync_core::data::{classify, DailyBar, DataProvider, FetchOutcome, FetchWindow};
use barsync_core::{ArtifactReceipt, ArtifactStore, RewriteRule};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backoff::BackoffPolicy;
use crate::sleeper::Sleeper;

/// Terminal status of one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolStatus {
    Success,
    NoData,
    NotFound,
    Failed,
}

/// Terminal outcome for one symbol after all retries and fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolResult {
    /// Final identifier; the rewritten one after a successful fallback.
    pub symbol: String,
    /// Catalog identifier the attempt started from, when it was rewritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewritten_from: Option<String>,
    pub status: SymbolStatus,
    /// Provider calls issued, rewrite fallback included.
    pub fetch_calls: u32,
    /// Last failure message, for `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactReceipt>,
}

impl SymbolResult {
    fn terminal(symbol: &str, status: SymbolStatus, fetch_calls: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            rewritten_from: None,
            status,
            fetch_calls,
            detail: None,
            artifact: None,
        }
    }

    fn failed(symbol: &str, fetch_calls: u32, detail: Option<String>) -> Self {
        Self {
            detail,
            ..Self::terminal(symbol, SymbolStatus::Failed, fetch_calls)
        }
    }

    /// The identifier this result belongs to in the input catalog.
    pub fn catalog_symbol(&self) -> &str {
        self.rewritten_from.as_deref().unwrap_or(&self.symbol)
    }

    /// `(from, to)` when this is a successful identifier rewrite.
    pub fn rewrite(&self) -> Option<(&str, &str)> {
        match (&self.rewritten_from, self.status) {
            (Some(from), SymbolStatus::Success) if from != &self.symbol => {
                Some((from.as_str(), self.symbol.as_str()))
            }
            _ => None,
        }
    }
}

/// Everything one attempt needs, borrowed from the exchange runner.
pub struct SymbolAttempt<'a> {
    pub exchange: &'a str,
    pub window: FetchWindow,
    pub provider: &'a dyn DataProvider,
    pub artifacts: &'a dyn ArtifactStore,
    pub policy: &'a BackoffPolicy,
    pub rewrite: Option<&'a RewriteRule>,
    pub sleeper: &'a dyn Sleeper,
    pub cancel: Option<&'a AtomicBool>,
}

impl SymbolAttempt<'_> {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|f| f.load(Ordering::Relaxed))
    }

    fn fetch(&self, symbol: &str) -> FetchOutcome {
        classify(
            self.provider
                .fetch(symbol, self.window.start, self.window.end),
        )
    }

    /// Run the attempt for `symbol`. Returns `None` if cancelled mid-way.
    pub fn run<R: Rng + ?Sized>(&self, symbol: &str, rng: &mut R) -> Option<SymbolResult> {
        let mut calls = 0u32;
        let mut last_error = None;

        for attempt in 0..self.policy.max_attempts {
            if self.is_cancelled() {
                return None;
            }

            calls += 1;
            let outcome = self.fetch(symbol);
            let kind = outcome.kind();

            match outcome {
                FetchOutcome::Success(bars) => {
                    return Some(self.persist(symbol, None, &bars, calls));
                }
                FetchOutcome::NoData => {
                    return Some(SymbolResult::terminal(symbol, SymbolStatus::NoData, calls));
                }
                FetchOutcome::NotFound => {
                    if attempt == 0 {
                        if let Some(rewritten) = self.rewrite.and_then(|r| r.apply(symbol)) {
                            if self.is_cancelled() {
                                return None;
                            }
                            calls += 1;
                            match self.fetch(&rewritten) {
                                FetchOutcome::Success(bars) => {
                                    return Some(self.persist(&rewritten, Some(symbol), &bars, calls));
                                }
                                other => debug!(
                                    exchange = self.exchange,
                                    symbol,
                                    rewritten = %rewritten,
                                    outcome = ?other.kind(),
                                    "rewrite fallback did not succeed"
                                ),
                            }
                        }
                    }
                    return Some(SymbolResult::terminal(symbol, SymbolStatus::NotFound, calls));
                }
                FetchOutcome::RateLimited(message) | FetchOutcome::TransientError(message) => {
                    let decision = self.policy.decide(kind, attempt, rng);
                    last_error = Some(message);
                    if !decision.retry {
                        break;
                    }
                    debug!(
                        exchange = self.exchange,
                        symbol,
                        attempt = attempt + 1,
                        outcome = ?kind,
                        wait_ms = decision.wait.as_millis() as u64,
                        "retrying after backoff"
                    );
                    self.sleeper.sleep(decision.wait);
                }
            }
        }

        Some(SymbolResult::failed(symbol, calls, last_error))
    }

    /// Write the artifact for a successful fetch. A write failure is terminal.
    fn persist(
        &self,
        symbol: &str,
        rewritten_from: Option<&str>,
        bars: &[DailyBar],
        calls: u32,
    ) -> SymbolResult {
        match self.artifacts.write(self.exchange, symbol, bars) {
            Ok(receipt) => SymbolResult {
                symbol: symbol.to_string(),
                rewritten_from: rewritten_from.map(str::to_string),
                status: SymbolStatus::Success,
                fetch_calls: calls,
                detail: None,
                artifact: Some(receipt),
            },
            Err(e) => {
                warn!(exchange = self.exchange, symbol, error = %e, "artifact write failed");
                // The catalog keeps the original identifier: nothing was stored under the new one.
                SymbolResult::failed(
                    rewritten_from.unwrap_or(symbol),
                    calls,
                    Some(format!("artifact write failed: {e}")),
                )
            }
        }
    }
}
