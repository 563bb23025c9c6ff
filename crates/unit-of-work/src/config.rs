//! Unit of work configuration.

use std::time::Duration;

/// Default bound on nested saves triggered by event handlers.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 32;

/// Unit of work settings.
///
/// Reads from environment variables:
/// - `UOW_MAX_CASCADE_DEPTH`: maximum nesting of saves (default: `32`)
/// - `UOW_TRANSACTION_TIMEOUT_MS`: deadline for a managed transaction
///   (default: none)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWorkConfig {
    pub max_cascade_depth: usize,
    pub transaction_timeout: Option<Duration>,
}

impl UnitOfWorkConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_cascade_depth: lookup("UOW_MAX_CASCADE_DEPTH")
                .and_then(|v| v.parse().ok())
                .filter(|depth| *depth > 0)
                .unwrap_or(defaults.max_cascade_depth),
            transaction_timeout: lookup("UOW_TRANSACTION_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        }
    }

    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = Some(timeout);
        self
    }
}

impl Default for UnitOfWorkConfig {
    fn default() -> Self {
        Self {
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            transaction_timeout: None,
        }
    }
}
