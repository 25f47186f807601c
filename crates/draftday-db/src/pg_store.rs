//! [`DraftStore`] backed by `PostgreSQL`.
//!
//! # Tables
//!
//! | Table | Key | Description |
//! |-------|-----|-------------|
//! | `items` | `id` | The shared item pool |
//! | `drafts` | `id` | Draft metadata, status and turn pointer |
//! | `draft_participants` | `(draft_id, participant_id)` | Seats, ordered by `seat` |
//! | `picks` | `id` | One row per pick, unique per pick number and per item |
//! | `draft_timers` | `draft_id` | At most one running countdown per draft |
//!
//! The two unique constraints on `picks` are what make a double-recorded
//! pick impossible; their violations come back as
//! [`StoreError::PickConflict`] and [`StoreError::ItemTaken`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use draftday_core::store::{DraftStore, StoreError};
use draftday_types::{
    AutopickStrategy, Draft, DraftId, DraftStatus, Item, ItemId, Participant, ParticipantId,
    ParticipantKind, Pick, PickId, TimerKind, TimerRecord,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

const PICK_NUMBER_CONSTRAINT: &str = "picks_draft_pick_number_key";
const PICK_ITEM_CONSTRAINT: &str = "picks_draft_item_key";

/// Durable draft state in `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgDraftStore {
    pool: PgPool,
}

impl PgDraftStore {
    /// Create a store over an open pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn seat_orders(
        &self,
        draft_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<ParticipantId>>, DbError> {
        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r"SELECT draft_id, participant_id
              FROM draft_participants
              WHERE draft_id = ANY($1)
              ORDER BY draft_id, seat",
        )
        .bind(draft_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut orders: HashMap<Uuid, Vec<ParticipantId>> = HashMap::new();
        for (draft_id, participant_id) in rows {
            orders
                .entry(draft_id)
                .or_default()
                .push(ParticipantId::from(participant_id));
        }
        Ok(orders)
    }
}

// =============================================================================
// Row types
// =============================================================================

/// A row from `drafts`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct DraftRow {
    id: Uuid,
    total_rounds: i32,
    pick_seconds: i32,
    current_round: i32,
    current_pick: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DraftRow {
    fn into_draft(self, order: Vec<ParticipantId>) -> Result<Draft, DbError> {
        Ok(Draft {
            id: DraftId::from(self.id),
            order,
            total_rounds: to_u32(self.total_rounds, "total_rounds")?,
            pick_seconds: to_u32(self.pick_seconds, "pick_seconds")?,
            current_round: to_u32(self.current_round, "current_round")?,
            current_pick: to_u32(self.current_pick, "current_pick")?,
            status: parse(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A row from `draft_participants`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ParticipantRow {
    participant_id: Uuid,
    display_name: String,
    kind: String,
    strategy: String,
    preferences: Vec<Uuid>,
}

impl TryFrom<ParticipantRow> for Participant {
    type Error = DbError;

    fn try_from(row: ParticipantRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ParticipantId::from(row.participant_id),
            display_name: row.display_name,
            kind: parse::<ParticipantKind>(&row.kind)?,
            strategy: parse::<AutopickStrategy>(&row.strategy)?,
            preferences: row.preferences.into_iter().map(ItemId::from).collect(),
        })
    }
}

/// A row from `picks`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PickRow {
    id: Uuid,
    draft_id: Uuid,
    participant_id: Uuid,
    item_id: Uuid,
    round: i32,
    pick_number: i32,
    is_auto_pick: bool,
    picked_at: DateTime<Utc>,
}

impl TryFrom<PickRow> for Pick {
    type Error = DbError;

    fn try_from(row: PickRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PickId::from(row.id),
            draft_id: DraftId::from(row.draft_id),
            participant_id: ParticipantId::from(row.participant_id),
            item_id: ItemId::from(row.item_id),
            round: to_u32(row.round, "round")?,
            pick_number: to_u32(row.pick_number, "pick_number")?,
            is_auto_pick: row.is_auto_pick,
            picked_at: row.picked_at,
        })
    }
}

/// A row from `items`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    name: String,
    attributes: serde_json::Value,
}

impl TryFrom<ItemRow> for Item {
    type Error = DbError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let attributes: BTreeMap<String, String> = serde_json::from_value(row.attributes)?;
        Ok(Self {
            id: ItemId::from(row.id),
            name: row.name,
            attributes,
        })
    }
}

/// A row from `draft_timers`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TimerRow {
    draft_id: Uuid,
    kind: String,
    participant_id: Option<Uuid>,
    pick_number: Option<i32>,
    duration_seconds: i32,
    started_at: DateTime<Utc>,
}

impl TryFrom<TimerRow> for TimerRecord {
    type Error = DbError;

    fn try_from(row: TimerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            draft_id: DraftId::from(row.draft_id),
            kind: parse::<TimerKind>(&row.kind)?,
            participant_id: row.participant_id.map(ParticipantId::from),
            pick_number: row
                .pick_number
                .map(|n| to_u32(n, "pick_number"))
                .transpose()?,
            duration_seconds: to_u32(row.duration_seconds, "duration_seconds")?,
            started_at: row.started_at,
        })
    }
}

fn to_u32(value: i32, column: &str) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|_| DbError::Corrupt(format!("{column} is negative: {value}")))
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn parse<T>(text: &str) -> Result<T, DbError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    text.parse::<T>()
        .map_err(|e| DbError::Corrupt(e.to_string()))
}

/// Translate a failed pick insert into the store's conflict errors.
fn pick_insert_error(pick: &Pick, err: sqlx::Error) -> StoreError {
    let constraint = match &err {
        sqlx::Error::Database(db) => db.constraint().map(str::to_owned),
        _ => None,
    };
    match constraint.as_deref() {
        Some(PICK_NUMBER_CONSTRAINT) => StoreError::PickConflict {
            draft_id: pick.draft_id,
            pick_number: pick.pick_number,
        },
        Some(PICK_ITEM_CONSTRAINT) => StoreError::ItemTaken {
            draft_id: pick.draft_id,
            item_id: pick.item_id,
        },
        _ => DbError::from(err).into(),
    }
}

const TIMER_COLUMNS: &str =
    "draft_id, kind, participant_id, pick_number, duration_seconds, started_at";

const ITEM_COLUMNS: &str = "id, name, attributes";

const DRAFT_COLUMNS: &str = "id, total_rounds, pick_seconds, current_round, current_pick, status, created_at, updated_at";

// =============================================================================
// DraftStore
// =============================================================================

#[async_trait]
impl DraftStore for PgDraftStore {
    async fn create_draft(
        &self,
        draft: &Draft,
        participants: &[Participant],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        sqlx::query(
            r"INSERT INTO drafts
              (id, total_rounds, pick_seconds, current_round, current_pick, status, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(draft.id.into_inner())
        .bind(to_i32(draft.total_rounds))
        .bind(to_i32(draft.pick_seconds))
        .bind(to_i32(draft.current_round))
        .bind(to_i32(draft.current_pick))
        .bind(draft.status.as_str())
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        for (seat, participant) in participants.iter().enumerate() {
            let preferences: Vec<Uuid> = participant
                .preferences
                .iter()
                .copied()
                .map(ItemId::into_inner)
                .collect();
            sqlx::query(
                r"INSERT INTO draft_participants
                  (draft_id, participant_id, seat, display_name, kind, strategy, preferences)
                  VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(draft.id.into_inner())
            .bind(participant.id.into_inner())
            .bind(i32::try_from(seat).unwrap_or(i32::MAX))
            .bind(&participant.display_name)
            .bind(participant.kind.as_str())
            .bind(participant.strategy.as_str())
            .bind(&preferences)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;
        }

        tx.commit().await.map_err(DbError::from)?;
        tracing::debug!(draft_id = %draft.id, seats = participants.len(), "inserted draft");
        Ok(())
    }

    async fn get_draft(&self, draft_id: DraftId) -> Result<Option<Draft>, StoreError> {
        let row: Option<DraftRow> =
            sqlx::query_as(&format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = $1"))
                .bind(draft_id.into_inner())
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut orders = self.seat_orders(&[row.id]).await?;
        let order = orders.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_draft(order)?))
    }

    async fn participants(&self, draft_id: DraftId) -> Result<Vec<Participant>, StoreError> {
        let rows: Vec<ParticipantRow> = sqlx::query_as(
            r"SELECT participant_id, display_name, kind, strategy, preferences
              FROM draft_participants
              WHERE draft_id = $1
              ORDER BY seat",
        )
        .bind(draft_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| Participant::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn list_drafts_by_status(
        &self,
        statuses: &[DraftStatus],
    ) -> Result<Vec<Draft>, StoreError> {
        let wanted: Vec<&str> = statuses.iter().copied().map(DraftStatus::as_str).collect();
        let rows: Vec<DraftRow> = sqlx::query_as(&format!(
            "SELECT {DRAFT_COLUMNS} FROM drafts WHERE status = ANY($1) ORDER BY created_at"
        ))
        .bind(&wanted)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut orders = self.seat_orders(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let order = orders.remove(&row.id).unwrap_or_default();
                row.into_draft(order).map_err(StoreError::from)
            })
            .collect()
    }

    async fn update_turn_pointer(
        &self,
        draft_id: DraftId,
        round: u32,
        pick: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE drafts SET current_round = $2, current_pick = $3, updated_at = $4
              WHERE id = $1",
        )
        .bind(draft_id.into_inner())
        .bind(to_i32(round))
        .bind(to_i32(pick))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        if result.rows_affected() == 0 {
            return Err(draft_missing(draft_id));
        }
        Ok(())
    }

    async fn set_status(
        &self,
        draft_id: DraftId,
        status: DraftStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE drafts SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(draft_id.into_inner())
            .bind(status.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        if result.rows_affected() == 0 {
            return Err(draft_missing(draft_id));
        }
        tracing::debug!(%draft_id, %status, "draft status updated");
        Ok(())
    }

    async fn record_pick(&self, pick: &Pick) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO picks
              (id, draft_id, participant_id, item_id, round, pick_number, is_auto_pick, picked_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(pick.id.into_inner())
        .bind(pick.draft_id.into_inner())
        .bind(pick.participant_id.into_inner())
        .bind(pick.item_id.into_inner())
        .bind(to_i32(pick.round))
        .bind(to_i32(pick.pick_number))
        .bind(pick.is_auto_pick)
        .bind(pick.picked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| pick_insert_error(pick, e))?;
        Ok(())
    }

    async fn list_picks(&self, draft_id: DraftId) -> Result<Vec<Pick>, StoreError> {
        let rows: Vec<PickRow> = sqlx::query_as(
            r"SELECT id, draft_id, participant_id, item_id, round, pick_number, is_auto_pick, picked_at
              FROM picks
              WHERE draft_id = $1
              ORDER BY pick_number",
        )
        .bind(draft_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| Pick::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn clear_picks(&self, draft_id: DraftId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM picks WHERE draft_id = $1")
            .bind(draft_id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }

    async fn seed_items(&self, items: &[Item]) -> Result<u64, StoreError> {
        if items.is_empty() {
            return Ok(0);
        }
        let mut ids = Vec::with_capacity(items.len());
        let mut names = Vec::with_capacity(items.len());
        let mut attributes = Vec::with_capacity(items.len());
        for item in items {
            ids.push(item.id.into_inner());
            names.push(item.name.clone());
            attributes.push(serde_json::to_value(&item.attributes).map_err(DbError::from)?);
        }

        let result = sqlx::query(
            r"INSERT INTO items (id, name, attributes)
              SELECT * FROM UNNEST($1::UUID[], $2::TEXT[], $3::JSONB[])
              ON CONFLICT (id) DO NOTHING",
        )
        .bind(&ids)
        .bind(&names)
        .bind(&attributes)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }

    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        let rows: Vec<ItemRow> =
            sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY name, id"))
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| Item::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn list_available_items(&self, draft_id: DraftId) -> Result<Vec<Item>, StoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            r"SELECT {ITEM_COLUMNS} FROM items i
              WHERE NOT EXISTS (
                  SELECT 1 FROM picks p WHERE p.draft_id = $1 AND p.item_id = i.id
              )
              ORDER BY name, id"
        ))
        .bind(draft_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| Item::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn start_timer(&self, timer: &TimerRecord) -> Result<(), StoreError> {
        upsert_timer(&self.pool, timer, None).await?;
        tracing::debug!(draft_id = %timer.draft_id, kind = timer.kind.as_str(), "timer persisted");
        Ok(())
    }

    async fn get_timer(&self, draft_id: DraftId) -> Result<Option<TimerRecord>, StoreError> {
        let row: Option<TimerRow> = sqlx::query_as(&format!(
            "SELECT {TIMER_COLUMNS} FROM draft_timers WHERE draft_id = $1"
        ))
        .bind(draft_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(row.map(TimerRecord::try_from).transpose()?)
    }

    async fn delete_timer(&self, draft_id: DraftId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM draft_timers WHERE draft_id = $1")
            .bind(draft_id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_timer_tick(
        &self,
        timer: &TimerRecord,
        remaining_seconds: i64,
    ) -> Result<(), StoreError> {
        upsert_timer(&self.pool, timer, Some(remaining_seconds)).await?;
        Ok(())
    }

    async fn list_active_timers(&self) -> Result<Vec<TimerRecord>, StoreError> {
        let rows: Vec<TimerRow> = sqlx::query_as(&format!(
            "SELECT {TIMER_COLUMNS} FROM draft_timers ORDER BY started_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| TimerRecord::try_from(row).map_err(StoreError::from))
            .collect()
    }
}

/// Insert or replace the countdown row for `timer.draft_id`.
///
/// `remaining` is set by tick mirrors and cleared when a countdown starts.
async fn upsert_timer(
    pool: &PgPool,
    timer: &TimerRecord,
    remaining: Option<i64>,
) -> Result<(), DbError> {
    sqlx::query(
        r"INSERT INTO draft_timers
          (draft_id, kind, participant_id, pick_number, duration_seconds, started_at, remaining_seconds, last_tick_at)
          VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $7::BIGINT IS NULL THEN NULL ELSE now() END)
          ON CONFLICT (draft_id) DO UPDATE SET
            kind = EXCLUDED.kind,
            participant_id = EXCLUDED.participant_id,
            pick_number = EXCLUDED.pick_number,
            duration_seconds = EXCLUDED.duration_seconds,
            started_at = EXCLUDED.started_at,
            remaining_seconds = EXCLUDED.remaining_seconds,
            last_tick_at = EXCLUDED.last_tick_at",
    )
    .bind(timer.draft_id.into_inner())
    .bind(timer.kind.as_str())
    .bind(timer.participant_id.map(ParticipantId::into_inner))
    .bind(timer.pick_number.map(to_i32))
    .bind(to_i32(timer.duration_seconds))
    .bind(timer.started_at)
    .bind(remaining)
    .execute(pool)
    .await?;
    Ok(())
}

fn draft_missing(draft_id: DraftId) -> StoreError {
    StoreError::NotFound {
        entity: "draft",
        id: draft_id.to_string(),
    }
}
