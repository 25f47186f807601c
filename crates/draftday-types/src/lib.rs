//! Shared type definitions for the draftday workspace.
//!
//! This crate is the single source of truth for the entities that flow
//! between the engine, the durable store, the cache, and observers. Types
//! are exported to `TypeScript` via `ts-rs` for observer clients.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for drafts, participants, items, picks
//! - [`enums`] -- Draft status, participant kind, autopick strategy, timer kind
//! - [`structs`] -- Draft, pick, item, timer record, full-state snapshot
//! - [`events`] -- Broadcast events and observer commands

pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{AutopickStrategy, DraftStatus, ParseEnumError, ParticipantKind, TimerKind};
pub use events::{DraftEvent, ObserverCommand};
pub use ids::{DraftId, ItemId, ParticipantId, PickId};
pub use structs::{
    Draft, DraftSnapshot, Item, NewDraft, Participant, Pick, TimerRecord, TurnSlot,
};
