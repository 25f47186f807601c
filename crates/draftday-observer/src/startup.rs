//! Spawn the observer server alongside the draft engine.
//!
//! # Usage
//!
//! ```rust,ignore
//! use draftday_observer::startup::spawn_observer;
//!
//! let state = Arc::new(AppState::new(manager));
//! let handle = spawn_observer(config, state, shutdown_signal)?;
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the observer HTTP server on a background Tokio task.
///
/// The address is validated before the task is spawned so obvious
/// misconfiguration fails the caller instead of a log line. The server
/// stops when `shutdown` resolves; await the returned handle to wait for
/// in-flight requests.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if `config` is not a valid address.
pub fn spawn_observer<F>(
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<JoinHandle<()>, StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.socket_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = crate::server::start_server(&config, state, shutdown).await {
            tracing::error!(error = %e, "observer server exited with error");
        }
    });

    tracing::info!(%addr, "observer server spawned on background task");
    Ok(handle)
}
