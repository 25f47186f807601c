//! Observer and administrative API for the Draftday engine.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/drafts/{id}`) subscribing one client
//!   to one draft's event stream
//! - **Query endpoints** for the full current state of a draft and the
//!   item pool
//! - **Administrative endpoints** to create, start, pick in, cancel,
//!   reset, and force-expire drafts
//!
//! Handlers hold no draft state of their own. Every request goes through
//! the [`DraftManager`](draftday_core::DraftManager) in [`AppState`].

pub mod error;
pub mod handlers;
pub mod operator;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
