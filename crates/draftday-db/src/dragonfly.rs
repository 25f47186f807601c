//! [`StateCache`] backed by `Dragonfly` (Redis-compatible).
//!
//! Values are JSON strings. Nothing here is authoritative: a cold or
//! unreachable cache only costs the manager a trip to `PostgreSQL`.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `draft:{id}:timer` | JSON | The countdown currently running |
//! | `draft:{id}:snapshot` | JSON | Last full-state snapshot |

use async_trait::async_trait;
use draftday_core::cache::{CacheError, StateCache};
use draftday_types::{DraftId, DraftSnapshot, TimerRecord};
use fred::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::DbError;

fn timer_key(draft_id: DraftId) -> String {
    format!("draft:{draft_id}:timer")
}

fn snapshot_key(draft_id: DraftId) -> String {
    format!("draft:{draft_id}:snapshot")
}

/// Connection handle to a `Dragonfly` instance.
#[derive(Clone)]
pub struct DragonflyCache {
    client: Client,
}

impl core::fmt::Debug for DragonflyCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DragonflyCache").finish_non_exhaustive()
    }
}

impl DragonflyCache {
    /// Connect to `Dragonfly` at `url` (`redis://host:port[/db]`).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed and
    /// [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("invalid Dragonfly URL: {e}")))?;
        let client = Builder::from_config(config).build()?;
        client.init().await?;
        tracing::info!("connected to Dragonfly");
        Ok(Self { client })
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: () = self.client.set(key, json.as_str(), None, None, false).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        Ok(value.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    async fn delete(&self, keys: Vec<String>) -> Result<(), DbError> {
        let _: u32 = self.client.del(keys).await?;
        Ok(())
    }

    /// Close the connection.
    pub async fn quit(&self) {
        if let Err(e) = self.client.quit().await {
            tracing::warn!(error = %e, "Dragonfly quit failed");
        }
    }
}

#[async_trait]
impl StateCache for DragonflyCache {
    async fn set_timer(&self, timer: &TimerRecord) -> Result<(), CacheError> {
        Ok(self.set_json(&timer_key(timer.draft_id), timer).await?)
    }

    async fn timer(&self, draft_id: DraftId) -> Result<Option<TimerRecord>, CacheError> {
        Ok(self.get_json(&timer_key(draft_id)).await?)
    }

    async fn clear_timer(&self, draft_id: DraftId) -> Result<(), CacheError> {
        Ok(self.delete(vec![timer_key(draft_id)]).await?)
    }

    async fn put_snapshot(&self, snapshot: &DraftSnapshot) -> Result<(), CacheError> {
        Ok(self
            .set_json(&snapshot_key(snapshot.draft.id), snapshot)
            .await?)
    }

    async fn snapshot(&self, draft_id: DraftId) -> Result<Option<DraftSnapshot>, CacheError> {
        Ok(self.get_json(&snapshot_key(draft_id)).await?)
    }

    async fn evict(&self, draft_id: DraftId) -> Result<(), CacheError> {
        Ok(self
            .delete(vec![timer_key(draft_id), snapshot_key(draft_id)])
            .await?)
    }
}
