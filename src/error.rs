use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Main error type for the agenda service
#[derive(Error, Debug)]
pub enum QuorumError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Lookup errors
    #[error("Agenda not found: {0}")]
    AgendaNotFound(Uuid),

    #[error("Attachment slot not found: {0}")]
    SlotNotFound(String),

    // Status machine errors
    #[error("Invalid status change: from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Agenda is locked: {0}")]
    Locked(Uuid),

    #[error("Batch rejected, {} agendas already in session", ids.len())]
    LockedBatch { ids: Vec<Uuid> },

    // Batch persistence errors
    #[error("Saved {saved} of {total} items, {} failed", failures.len())]
    PartialBatch {
        saved: usize,
        total: usize,
        failures: Vec<(Uuid, String)>,
    },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Document storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for QuorumError
pub type Result<T> = std::result::Result<T, QuorumError>;

/// Specific error types for blob storage backends
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Object not found: {path}")]
    NotFound { path: String },

    #[error("Write failed for {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Delete failed for {path}: {reason}")]
    DeleteFailed { path: String, reason: String },

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Specific error types for signed document access
#[derive(Error, Debug, Clone)]
pub enum AccessError {
    #[error("Reference expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    #[error("Signature mismatch")]
    BadSignature,

    #[error("Malformed reference: {0}")]
    Malformed(String),

    #[error("Scratch copy missing: {0}")]
    ScratchMissing(String),
}
