use thiserror::Error;

/// Errors returned by `StompClient` operations.
#[derive(Error, Debug)]
pub enum StompError {
    /// `subscribe` was called with an empty destination
    #[error("invalid subscription: destination must not be empty")]
    EmptyDestination,
    /// Payload could not be serialized
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// The connection task has stopped
    #[error("client closed")]
    Closed,
}
