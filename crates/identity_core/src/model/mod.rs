//! Storage-agnostic domain model.
//!
//! # Responsibility
//! - Define the value types callers construct and receive.
//! - Keep storage and token encodings out of business shapes.
//!
//! # Invariants
//! - Users are identified by a stable, caller-chosen `account_id`.
//! - Unknown role strings map to `UserRole::Unknown`, never to an error.

pub mod token;
pub mod user;
