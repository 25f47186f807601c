//! Storage backends for the Draftday engine.
//!
//! `PostgreSQL` is the durable store: drafts, seats, picks, the item pool
//! and countdown records live there and survive restarts. `Dragonfly` is an
//! optional ephemeral cache for running timers and full-state snapshots.
//!
//! ```text
//! DraftManager
//!     |
//!     +-- DraftStore --> PgDraftStore   --> PostgreSQL (PostgresPool)
//!     |
//!     +-- StateCache --> DragonflyCache --> Dragonfly
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and migrations
//! - [`pg_store`] -- [`DraftStore`](draftday_core::store::DraftStore) implementation
//! - [`dragonfly`] -- [`StateCache`](draftday_core::cache::StateCache) implementation
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod pg_store;
pub mod postgres;

pub use dragonfly::DragonflyCache;
pub use error::DbError;
pub use pg_store::PgDraftStore;
pub use postgres::{PostgresConfig, PostgresPool};
