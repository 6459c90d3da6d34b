//! Shared fixtures: a scripted in-memory provider, a recording sleeper, and a
//! temp-dir harness wiring both into real JSON/CSV stores.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use barsync_core::data::{DailyBar, DataProvider, FetchWindow, ProviderError};
use barsync_core::{Catalog, CatalogStore, CsvArtifactStore, JitterSeeds, JsonCatalogStore};
use barsync_runner::{BackoffPolicy, PipelineDriver, RunSettings, Sleeper, WaitWindow};
use chrono::NaiveDate;

/// One scripted provider response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Bars(usize),
    Empty,
    NotFound,
    RateLimited,
    Transient,
}

impl Reply {
    fn into_result(self, start: NaiveDate) -> Result<Vec<DailyBar>, ProviderError> {
        match self {
            Reply::Bars(n) => Ok(bars(start, n)),
            Reply::Empty => Ok(Vec::new()),
            Reply::NotFound => Err(ProviderError::http(404, "No data found, symbol may be delisted")),
            Reply::RateLimited => Err(ProviderError::http(429, "Too Many Requests")),
            Reply::Transient => Err(ProviderError::message("connection reset by peer")),
        }
    }
}

pub fn bars(start: NaiveDate, n: usize) -> Vec<DailyBar> {
    (0..n)
        .map(|i| {
            let price = 100.0 + i as f64;
            DailyBar {
                date: start + chrono::Duration::days(i as i64),
                open: price,
                high: price + 1.0,
                low: price - 1.0,
                close: price + 0.5,
                adj_close: price + 0.5,
                volume: 1_000 + i as u64,
            }
        })
        .collect()
}

/// Provider answering from per-symbol scripts. The last reply of a script
/// repeats forever; unscripted symbols are not found.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn script(&self, symbol: &str, replies: &[Reply]) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(symbol.to_string(), replies.iter().copied().collect());
        self
    }

    pub fn calls_for(&self, symbol: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|s| *s == symbol).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, symbol: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(symbol) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().copied().unwrap_or(Reply::NotFound),
            None => Reply::NotFound,
        }
    }
}

impl DataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(symbol.to_string());

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let reply = self.next_reply(symbol);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply.into_result(start)
    }
}

/// Sleeper that records requested durations instead of blocking.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }

    pub fn nonzero_waits(&self) -> Vec<Duration> {
        self.waits().into_iter().filter(|d| !d.is_zero()).collect()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

pub fn window() -> FetchWindow {
    FetchWindow::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
    )
}

/// Default backoff windows, zero pacing, fixed seed.
pub fn settings(per_exchange: usize) -> RunSettings {
    RunSettings {
        window: window(),
        policy: BackoffPolicy::default(),
        pacing: WaitWindow::none(),
        per_exchange,
        across_exchanges: 1,
        seeds: JitterSeeds::new(42),
    }
}

/// Temp-dir stores plus scripted collaborators.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub catalogs: JsonCatalogStore,
    pub artifacts: CsvArtifactStore,
    pub provider: ScriptedProvider,
    pub sleeper: RecordingSleeper,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_provider(ScriptedProvider::new())
    }

    pub fn with_provider(provider: ScriptedProvider) -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            catalogs: JsonCatalogStore::new(dir.path().join("catalogs")),
            artifacts: CsvArtifactStore::new(dir.path().join("public")),
            provider,
            sleeper: RecordingSleeper::default(),
            dir,
        }
    }

    pub fn driver(&self, settings: RunSettings) -> PipelineDriver<'_> {
        PipelineDriver::new(&self.provider, &self.catalogs, &self.artifacts, settings)
            .with_sleeper(&self.sleeper)
    }

    pub fn write_catalog(&self, exchange: &str, symbols: &[&str]) {
        self.catalogs
            .save(&Catalog::from_symbols(exchange, symbols))
            .unwrap();
    }

    pub fn catalog_symbols(&self, exchange: &str) -> Vec<String> {
        self.catalogs
            .load(exchange)
            .unwrap()
            .symbols()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn artifact_exists(&self, exchange: &str, symbol: &str) -> bool {
        self.artifacts.path_for(exchange, symbol).exists()
    }
}
