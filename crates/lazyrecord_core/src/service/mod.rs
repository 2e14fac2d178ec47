//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Validate caller input the stores deliberately leave unchecked.
//! - Keep HTTP/CLI layers decoupled from storage details.

pub mod counter_service;
pub mod error;
pub mod greeting_service;
pub mod message_service;
