//! Identifier rewrite rules used as a one-shot fallback for not-found symbols.

use serde::{Deserialize, Serialize};

/// How to derive an alternate identifier for a symbol the provider rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteRule {
    /// Append a market suffix, e.g. `BTC` -> `BTC-USD`.
    AppendSuffix(String),
}

impl RewriteRule {
    /// The rewritten identifier, or `None` if the rule does not apply.
    pub fn apply(&self, symbol: &str) -> Option<String> {
        match self {
            RewriteRule::AppendSuffix(suffix) => {
                if suffix.is_empty() || symbol.ends_with(suffix.as_str()) {
                    None
                } else {
                    Some(format!("{symbol}{suffix}"))
                }
            }
        }
    }
}
