//! Error types for the intent bridge.

/// Top-level error returned by the host loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the external key-value hash store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// NLU backend errors.
#[derive(Debug, thiserror::Error)]
pub enum NluError {
    #[error("Backend {backend} request failed: {reason}")]
    RequestFailed { backend: String, reason: String },

    #[error("Backend {backend} returned HTTP {status}: {body}")]
    HttpStatus {
        backend: String,
        status: u16,
        body: String,
    },

    #[error("Backend {backend} reported status {code} ({error_type}): {details}")]
    Status {
        backend: String,
        code: u16,
        error_type: String,
        details: String,
    },

    #[error("Invalid response from {backend}: {reason}")]
    InvalidResponse { backend: String, reason: String },
}

/// Transport-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Synchronous faults raised while processing one turn.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("Message from {user} has no channel id on a channel-oriented transport")]
    MissingChannel { user: String },

    #[error("Failed to encode inbound message as request context: {0}")]
    Context(#[from] serde_json::Error),
}

/// A listener's own failure. Caught and logged by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("{0}")]
    Failed(String),

    #[error("Reply failed: {0}")]
    Reply(#[from] ChannelError),
}
