//! Error types shared across the MaaDesk crates.

use thiserror::Error;

/// All errors surfaced by the core crates.
#[derive(Debug, Error)]
pub enum MaadeskError {
    /// Config serialization/persistence failure. Load failures never
    /// produce this — a missing or corrupt document starts from defaults.
    #[error("config error: {0}")]
    Config(String),

    /// Schema-version store or legacy-data access failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A remote fetch failed; the message is the structured error the
    /// caller may log or forward.
    #[error("network error: {0}")]
    Network(String),

    /// A platform capability (window enumeration, key synthesis, power
    /// action) failed. Tick-loop call sites log and swallow this.
    #[error("platform error: {0}")]
    Platform(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MaadeskError>;
