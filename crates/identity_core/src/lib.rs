//! Identity core: pooled SQLite sessions, a generic record repository and
//! RS256 token issuance for account authentication.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod token;

pub use config::{
    ConfigError, DatabaseConfig, DatabaseLocation, KeySource, LoggingConfig, Settings,
    TokenConfig,
};
pub use db::{PoolStatus, ScopedSession, SessionManager};
pub use error::{
    AuthResult, ConstraintKind, Error, StorageError, StorageResult, TokenError, TokenResult,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::token::{Token, TokenType};
pub use model::user::{LoginRequest, User, UserAuth, UserRole};
pub use repo::user_repo::{UserRecord, UserRepository};
pub use repo::{Fields, IntoValue, Key, Record, Repository};
pub use service::auth_service::AuthService;
pub use token::{encode_token, AccessClaims, KeyPair, RefreshClaims, TokenManager};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
