//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the note store contract the reminder engine consumes.
//! - Isolate SQLite query details from service/engine orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Note::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod note_repo;
