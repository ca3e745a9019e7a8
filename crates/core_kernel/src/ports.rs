//! Ports to external coordination services
//!
//! Cross-instance mutual exclusion and monotonic numbering are provided by an
//! external atomic key-value service. Domain code depends only on these
//! traits; `infra_store` ships the in-process adapters.

use async_trait::async_trait;

use crate::error::ServiceResult;

/// Set-if-absent mutual exclusion over string keys.
///
/// `try_acquire` never blocks: it reports whether this caller became the
/// holder. Holders release explicitly; there is no lease expiry, so callers
/// must release in all exit paths.
#[async_trait]
pub trait LockStore: Send + Sync + 'static {
    /// Attempts to become the holder of `key`. Returns `true` exactly once
    /// per key until the holder releases it.
    async fn try_acquire(&self, key: &str) -> ServiceResult<bool>;

    /// Releases `key`. Releasing a key that is not held is a no-op.
    async fn release(&self, key: &str) -> ServiceResult<()>;
}

/// Atomic per-key counters for business-number generation.
#[async_trait]
pub trait SequenceStore: Send + Sync + 'static {
    /// Increments the counter behind `key` and returns the new value,
    /// starting at 1 for a fresh key.
    async fn next(&self, key: &str) -> ServiceResult<u64>;
}
