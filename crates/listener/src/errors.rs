//! Error types for the listener infrastructure.

use std::net::SocketAddr;

use thiserror::Error;

/// The webhook HTTP server could not start or stopped abnormally.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind webhook listener to {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("webhook listener stopped unexpectedly")]
    Serve(#[source] std::io::Error),
}

/// An alert backend failed to deliver one event.
///
/// Workers log the failure and move on to the next event; there is no retry.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The backend rejected or failed the delivery.
    #[error("alert backend '{backend}' failed: {message}")]
    Backend {
        /// Name of the backend, as returned by `AlertDispatcher::name`.
        backend: String,
        /// Backend-specific description of the failure.
        message: String,
    },
}
