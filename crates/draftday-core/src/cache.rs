//! Ephemeral state cache contract.
//!
//! Holds the running timer and the last full-state snapshot per draft so
//! read paths avoid re-deriving state from the durable store. The cache is
//! allowed to be empty, stale, or unreachable: pick validation never reads
//! from it, and every write is best-effort.

use async_trait::async_trait;
use draftday_types::{DraftId, DraftSnapshot, TimerRecord};

/// Errors raised by a cache backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached or rejected the command.
    #[error("cache backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// A cached value could not be encoded or decoded.
    #[error("cache serialization error: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },
}

/// Fast, lossy per-draft state.
#[async_trait]
pub trait StateCache: Send + Sync + core::fmt::Debug {
    /// Remember the countdown currently running for a draft.
    async fn set_timer(&self, timer: &TimerRecord) -> Result<(), CacheError>;

    /// The countdown last remembered for a draft.
    async fn timer(&self, draft_id: DraftId) -> Result<Option<TimerRecord>, CacheError>;

    /// Forget the countdown for a draft.
    async fn clear_timer(&self, draft_id: DraftId) -> Result<(), CacheError>;

    /// Remember a full-state snapshot.
    async fn put_snapshot(&self, snapshot: &DraftSnapshot) -> Result<(), CacheError>;

    /// The snapshot last remembered for a draft.
    async fn snapshot(&self, draft_id: DraftId) -> Result<Option<DraftSnapshot>, CacheError>;

    /// Forget everything cached for a draft.
    async fn evict(&self, draft_id: DraftId) -> Result<(), CacheError>;
}
