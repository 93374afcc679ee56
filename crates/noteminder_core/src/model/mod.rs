//! Domain model for notes and their reminders.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep reminder state owned by the note record, never stored separately.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteUuid`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod note;
pub mod reminder;
