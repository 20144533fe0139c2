//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and token calls into use-case level APIs.
//! - Keep transport layers decoupled from storage and key details.

pub mod auth_service;
