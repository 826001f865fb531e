//! Recovery engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the recovery flows, constructed once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Inactivity timeout for a backfill session
    pub backfill_timeout: Duration,
    /// Lifetime of suggestion-confirm and incident-detail affordances
    pub affordance_ttl: Duration,
    /// Minimum Jaro-Winkler score for a command suggestion
    pub similarity_threshold: f64,
}

impl RecoveryConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a backfill timeout
    #[inline]
    #[must_use]
    pub fn with_backfill_timeout(mut self, timeout: Duration) -> Self {
        self.backfill_timeout = timeout;
        self
    }

    /// With an affordance lifetime
    #[inline]
    #[must_use]
    pub fn with_affordance_ttl(mut self, ttl: Duration) -> Self {
        self.affordance_ttl = ttl;
        self
    }

    /// With a similarity threshold
    #[inline]
    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            backfill_timeout: Duration::from_secs(180),
            affordance_ttl: Duration::from_secs(180),
            similarity_threshold: 0.7,
        }
    }
}
