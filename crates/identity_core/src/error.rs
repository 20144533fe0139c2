//! Error taxonomy for storage, token and auth flows.
//!
//! # Responsibility
//! - Give callers a small, fixed set of error kinds per category.
//! - Keep backend-specific error types (SQLite, pool, JWT) out of public
//!   signatures except as opaque `source()` causes.
//!
//! # Invariants
//! - `NotFound` and `AlreadyExists` are never collapsed into each other.
//! - `ExpiredToken` is treated as a specialization of `InvalidToken`
//!   (see [`TokenError::is_invalid`]).

use crate::config::ConfigError;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;
pub type TokenResult<T> = Result<T, TokenError>;
pub type AuthResult<T> = Result<T, Error>;

/// Boxed backend cause carried by [`StorageError::StorageFailure`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Constraint class reported by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    PrimaryKey,
    ForeignKey,
    NotNull,
    Check,
    Other,
}

impl ConstraintKind {
    /// Unique and primary-key violations both mean "this identity is taken".
    pub fn is_uniqueness(self) -> bool {
        matches!(self, Self::Unique | Self::PrimaryKey)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::PrimaryKey => "primary_key",
            Self::ForeignKey => "foreign_key",
            Self::NotNull => "not_null",
            Self::Check => "check",
            Self::Other => "other",
        }
    }
}

/// Storage-category errors surfaced by the session manager and repositories.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No row matched the requested key or criteria.
    #[error("record not found: {0}")]
    NotFound(String),
    /// A create collided with an existing identity or unique value.
    #[error("record already exists: {0}")]
    AlreadyExists(String),
    /// Constraint violation not classified as a duplicate.
    #[error("integrity violation ({}): {message}", .kind.as_str())]
    IntegrityViolation { kind: ConstraintKind, message: String },
    /// Unexpected backend failure; the original cause is kept for logging.
    #[error("storage failure: {0}")]
    StorageFailure(#[source] BoxedCause),
    /// Key arity does not match the record's declared key columns.
    #[error("key for `{table}` has {actual} component(s), expected {expected}")]
    KeyMismatch {
        table: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Column name rejected before it reached SQL.
    #[error("column `{column}` cannot be used on `{table}`: {reason}")]
    InvalidColumn {
        table: &'static str,
        column: String,
        reason: &'static str,
    },
    /// Persisted row cannot be mapped back to a record.
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl StorageError {
    /// Wraps any backend error as an opaque [`StorageError::StorageFailure`].
    pub fn failure(cause: impl Into<BoxedCause>) -> Self {
        Self::StorageFailure(cause.into())
    }

    /// Stable short code used in structured log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::IntegrityViolation { .. } => "integrity_violation",
            Self::StorageFailure(_) => "storage_failure",
            Self::KeyMismatch { .. } => "key_mismatch",
            Self::InvalidColumn { .. } => "invalid_column",
            Self::InvalidData(_) => "invalid_data",
            Self::UnsupportedSchemaVersion { .. } => "unsupported_schema_version",
        }
    }
}

/// Token-category errors surfaced by the token manager.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature, structure or claim verification failed.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// Signature is valid but `exp` is in the past.
    #[error("token has expired")]
    ExpiredToken,
    /// Key material could not be parsed or derived.
    #[error("invalid key material: {0}")]
    KeyMaterial(String),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl TokenError {
    /// Returns `true` for every error meaning "do not trust this token",
    /// which includes expiry.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::InvalidToken(_) | Self::ExpiredToken)
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Self::ExpiredToken)
    }
}

/// Crate-level error used by orchestration code spanning several layers.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The principal exists but may not authenticate.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}
