//! Outcome classifier: maps a raw provider result onto a closed set of kinds.
//!
//! Every retry decision downstream keys off `OutcomeKind`, so the mapping is
//! total: any `ProviderError` lands in exactly one of the four failure kinds.

use serde::{Deserialize, Serialize};

use super::provider::{DailyBar, ProviderError};

/// Message fragments (lowercase) that mean the symbol does not exist.
const NOT_FOUND_MARKERS: &[&str] = &[
    "not found",
    "no data found, symbol may be delisted",
    "symbol may be delisted",
    "no such symbol",
    "invalid symbol",
    "unknown symbol",
];

/// Message fragments (lowercase) that mean the provider is throttling us.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "too many requests",
    "rate limit",
    "rate-limit",
    "ratelimit",
    "throttl",
];

/// Result of one classified fetch call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Vec<DailyBar>),
    NoData,
    NotFound,
    RateLimited(String),
    TransientError(String),
}

/// Payload-free tag of a `FetchOutcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    NoData,
    NotFound,
    RateLimited,
    TransientError,
}

impl FetchOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            FetchOutcome::Success(_) => OutcomeKind::Success,
            FetchOutcome::NoData => OutcomeKind::NoData,
            FetchOutcome::NotFound => OutcomeKind::NotFound,
            FetchOutcome::RateLimited(_) => OutcomeKind::RateLimited,
            FetchOutcome::TransientError(_) => OutcomeKind::TransientError,
        }
    }
}

/// Classify a raw provider result.
pub fn classify(raw: Result<Vec<DailyBar>, ProviderError>) -> FetchOutcome {
    match raw {
        Ok(bars) if bars.is_empty() => FetchOutcome::NoData,
        Ok(bars) => FetchOutcome::Success(bars),
        Err(err) => classify_error(&err),
    }
}

/// Classify a provider failure. Status codes win over message text.
///
/// Message markers only decide when the status is absent or not one of the
/// decisive codes. A server-side failure (408, 5xx) is always transient, so
/// a "not found" in an upstream error page can never drop a symbol.
pub fn classify_error(err: &ProviderError) -> FetchOutcome {
    match err.status {
        Some(404) | Some(410) => return FetchOutcome::NotFound,
        Some(429) => return FetchOutcome::RateLimited(err.to_string()),
        Some(408) | Some(500..=599) => return FetchOutcome::TransientError(err.to_string()),
        _ => {}
    }

    let message = err.message.to_lowercase();
    if RATE_LIMIT_MARKERS.iter().any(|m| message.contains(m)) {
        FetchOutcome::RateLimited(err.to_string())
    } else if NOT_FOUND_MARKERS.iter().any(|m| message.contains(m)) {
        FetchOutcome::NotFound
    } else {
        FetchOutcome::TransientError(err.to_string())
    }
}
