//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate record store calls into use-case level APIs.
//! - Keep transport/CLI layers decoupled from storage details.

pub mod voting_service;
