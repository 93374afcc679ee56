//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate note writes and reminder scheduling into use-case APIs.
//! - Keep UI/FFI layers decoupled from storage and platform details.

pub mod note_service;
