//! Property tests for retry and reconciliation invariants.
//!
//! Uses proptest to verify:
//! 1. Reconciliation removes exactly the not-found symbols and keeps order
//! 2. An attempt never issues more than max_attempts fetches plus one rewrite
//! 3. Every retry after a throttled/transient outcome waits a nonzero time
//! 4. Terminal outcomes never wait

mod common;

use std::collections::HashSet;

use barsync_core::data::{FetchWindow, OutcomeKind};
use barsync_core::{Catalog, RewriteRule};
use barsync_runner::{
    reconcile, BackoffPolicy, SymbolAttempt, SymbolResult, SymbolStatus, WaitWindow,
};
use common::{window, Harness, Reply};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_status() -> impl Strategy<Value = SymbolStatus> {
    prop_oneof![
        Just(SymbolStatus::Success),
        Just(SymbolStatus::NoData),
        Just(SymbolStatus::NotFound),
        Just(SymbolStatus::Failed),
    ]
}

fn arb_reply() -> impl Strategy<Value = Reply> {
    prop_oneof![
        (1usize..5).prop_map(Reply::Bars),
        Just(Reply::Empty),
        Just(Reply::NotFound),
        Just(Reply::RateLimited),
        Just(Reply::Transient),
    ]
}

fn arb_catalog() -> impl Strategy<Value = Vec<(String, SymbolStatus)>> {
    prop::collection::hash_set("[A-Z]{1,4}", 0..30).prop_flat_map(|symbols| {
        let symbols: Vec<String> = symbols.into_iter().collect();
        let n = symbols.len();
        (Just(symbols), prop::collection::vec(arb_status(), n))
            .prop_map(|(s, st)| s.into_iter().zip(st).collect::<Vec<_>>())
    })
}

fn result(symbol: &str, status: SymbolStatus) -> SymbolResult {
    SymbolResult {
        symbol: symbol.to_string(),
        rewritten_from: None,
        status,
        fetch_calls: 1,
        detail: None,
        artifact: None,
    }
}

fn policy(max_attempts: u32) -> BackoffPolicy {
    BackoffPolicy {
        max_attempts,
        rate_limited: WaitWindow::from_millis(5_000, 10_000),
        transient: WaitWindow::from_millis(2_000, 4_000),
    }
}

// ── 1. Reconciliation ────────────────────────────────────────────────

proptest! {
    /// The reconciled catalog is the input minus exactly the not-found symbols.
    #[test]
    fn reconcile_removes_exactly_not_found(entries in arb_catalog()) {
        let symbols: Vec<&str> = entries.iter().map(|(s, _)| s.as_str()).collect();
        let catalog = Catalog::from_symbols("US", &symbols);
        let results: Vec<SymbolResult> =
            entries.iter().map(|(s, st)| result(s, *st)).collect();

        let rec = reconcile(&catalog, &results);

        let not_found: HashSet<&str> = entries
            .iter()
            .filter(|(_, st)| *st == SymbolStatus::NotFound)
            .map(|(s, _)| s.as_str())
            .collect();
        let expected: Vec<&str> =
            symbols.iter().copied().filter(|s| !not_found.contains(s)).collect();

        prop_assert_eq!(rec.catalog.symbols(), expected);
        prop_assert_eq!(rec.removed.len(), not_found.len());
        prop_assert_eq!(rec.changed, !not_found.is_empty());
        prop_assert!(rec.renamed.is_empty());
    }

    /// Reconciling the reconciled catalog with the same results changes nothing.
    #[test]
    fn reconcile_is_idempotent(entries in arb_catalog()) {
        let symbols: Vec<&str> = entries.iter().map(|(s, _)| s.as_str()).collect();
        let catalog = Catalog::from_symbols("US", &symbols);
        let results: Vec<SymbolResult> =
            entries.iter().map(|(s, st)| result(s, *st)).collect();

        let once = reconcile(&catalog, &results);
        let twice = reconcile(&once.catalog, &results);

        prop_assert!(!twice.changed);
        prop_assert_eq!(twice.catalog, once.catalog);
    }
}

// ── 2–4. Attempt bounds and waits ────────────────────────────────────

fn run_attempt(
    replies: &[Reply],
    max_attempts: u32,
    rewrite: Option<&RewriteRule>,
    seed: u64,
) -> (SymbolResult, usize, Vec<std::time::Duration>) {
    let h = Harness::new();
    h.provider.script("XYZ", replies);
    h.provider.script("XYZ-USD", &[Reply::Bars(2)]);
    let policy = policy(max_attempts);
    let window: FetchWindow = window();

    let attempt = SymbolAttempt {
        exchange: "CC",
        window,
        provider: &h.provider,
        artifacts: &h.artifacts,
        policy: &policy,
        rewrite,
        sleeper: &h.sleeper,
        cancel: None,
    };
    let mut rng = StdRng::seed_from_u64(seed);
    let result = attempt.run("XYZ", &mut rng).expect("not cancelled");
    (result, h.provider.total_calls(), h.sleeper.waits())
}

fn kind(reply: Reply) -> OutcomeKind {
    match reply {
        Reply::Bars(_) => OutcomeKind::Success,
        Reply::Empty => OutcomeKind::NoData,
        Reply::NotFound => OutcomeKind::NotFound,
        Reply::RateLimited => OutcomeKind::RateLimited,
        Reply::Transient => OutcomeKind::TransientError,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Fetch calls never exceed max_attempts plus the one rewrite call.
    #[test]
    fn attempt_calls_are_bounded(
        replies in prop::collection::vec(arb_reply(), 1..8),
        max_attempts in 1u32..6,
        with_rewrite in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let rule = RewriteRule::AppendSuffix("-USD".into());
        let rewrite = with_rewrite.then_some(&rule);
        let (result, calls, _) = run_attempt(&replies, max_attempts, rewrite, seed);

        let limit = max_attempts as usize + usize::from(with_rewrite);
        prop_assert!(calls <= limit, "calls {} > limit {}", calls, limit);
        prop_assert_eq!(result.fetch_calls as usize, calls);
    }

    /// Waits happen only after retryable outcomes, are nonzero, and fall in
    /// the window of the outcome that caused them.
    #[test]
    fn waits_follow_retryable_outcomes(
        replies in prop::collection::vec(arb_reply(), 1..8),
        max_attempts in 1u32..6,
        seed in any::<u64>(),
    ) {
        let (result, calls, waits) = run_attempt(&replies, max_attempts, None, seed);
        let policy = policy(max_attempts);

        // Replies consumed in order; the last one repeats once the script runs out.
        let seen: Vec<Reply> = (0..calls)
            .map(|i| replies[i.min(replies.len() - 1)])
            .collect();

        // Every fetch except the last was followed by exactly one wait.
        prop_assert_eq!(waits.len(), calls - 1);
        for (reply, wait) in seen.iter().zip(&waits) {
            prop_assert!(!wait.is_zero());
            match kind(*reply) {
                OutcomeKind::RateLimited => prop_assert!(policy.rate_limited.contains(*wait)),
                OutcomeKind::TransientError => prop_assert!(policy.transient.contains(*wait)),
                other => prop_assert!(false, "waited after {:?}", other),
            }
        }

        // The final outcome decides the terminal status.
        let last = kind(seen[calls - 1]);
        let expected = match last {
            OutcomeKind::Success => SymbolStatus::Success,
            OutcomeKind::NoData => SymbolStatus::NoData,
            OutcomeKind::NotFound => SymbolStatus::NotFound,
            OutcomeKind::RateLimited | OutcomeKind::TransientError => SymbolStatus::Failed,
        };
        prop_assert_eq!(result.status, expected);
    }
}
