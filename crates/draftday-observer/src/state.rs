//! Shared application state for the observer server.
//!
//! Handlers never own draft state themselves; everything goes through the
//! injected [`DraftManager`], so the HTTP surface and the timer tasks see
//! the same drafts.

use draftday_core::DraftManager;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The service running every draft hosted by this process.
    pub manager: DraftManager,
}

impl AppState {
    /// Wrap a manager.
    pub const fn new(manager: DraftManager) -> Self {
        Self { manager }
    }
}
