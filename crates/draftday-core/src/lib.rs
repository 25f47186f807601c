//! Draft orchestration engine.
//!
//! This crate owns everything with real invariants: snake turn order, the
//! category cap, fallback selection, the per-draft countdown, startup
//! recovery and the observer fan-out. Storage and caching are reached
//! through the [`DraftStore`] and [`StateCache`] traits so the engine runs
//! the same against `PostgreSQL`/`Dragonfly` or the in-memory backends.
//!
//! # Modules
//!
//! - [`autopick`] -- Fallback selection strategies and pacing.
//! - [`cache`] -- [`StateCache`] contract for the ephemeral cache.
//! - [`clock`] -- [`Clock`] trait, system and monotonic clocks.
//! - [`config`] -- Configuration loading from `draftday-config.yaml`.
//! - [`eligibility`] -- Category cap rule and its override.
//! - [`error`] -- [`DraftError`] taxonomy.
//! - [`fanout`] -- Per-draft observer broadcast with liveness sweeps.
//! - [`manager`] -- [`DraftManager`], the service injected into handlers.
//! - [`memory`] -- In-memory store and cache.
//! - [`pool`] -- The default 32-item pool.
//! - [`recovery`] -- Startup recovery of in-flight countdowns.
//! - [`store`] -- [`DraftStore`] durable store contract.
//! - [`timer`] -- Countdown registry, tick loop and expiry handling.
//! - [`turn`] -- Pure snake-order turn engine.
//!
//! [`Clock`]: clock::Clock
//! [`DraftError`]: error::DraftError
//! [`DraftManager`]: manager::DraftManager
//! [`DraftStore`]: store::DraftStore
//! [`StateCache`]: cache::StateCache

pub mod autopick;
pub mod cache;
pub mod clock;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod fanout;
pub mod manager;
pub mod memory;
pub mod pool;
pub mod recovery;
pub mod store;
pub mod timer;
pub mod turn;

pub use manager::{DraftManager, DraftManagerBuilder, LoggingPoolInitializer, PoolInitializer};
pub use recovery::RecoveryReport;
