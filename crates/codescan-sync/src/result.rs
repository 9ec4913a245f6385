//! Result accounting for bulk synchronization runs.

/// Outcome counters of one or more bulk runs.
///
/// Partial failure is normal operation: failed items simply stay in the
/// recovery queue for a later pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexingResult {
    /// Number of requests applied (writes plus deletes).
    pub total: u64,
    /// Number of requests that failed.
    pub failures: u64,
}

impl IndexingResult {
    /// Create a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful request.
    pub fn record_success(&mut self) {
        self.total += 1;
    }

    /// Record a failed request.
    pub fn record_failure(&mut self) {
        self.total += 1;
        self.failures += 1;
    }

    /// Number of successful requests.
    pub fn successes(&self) -> u64 {
        self.total - self.failures
    }

    /// Whether every request succeeded.
    pub fn is_success(&self) -> bool {
        self.failures == 0
    }

    /// Merge another result into this one.
    pub fn merge(&mut self, other: &IndexingResult) {
        self.total += other.total;
        self.failures += other.failures;
    }
}
