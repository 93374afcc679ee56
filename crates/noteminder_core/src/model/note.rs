//! Note domain model.
//!
//! # Responsibility
//! - Define the note record whose reminder fields drive scheduling.
//! - Provide lifecycle helpers for soft-delete semantics.
//! - Validate reminder field combinations before persistence.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another note.
//! - `deleted_at > 0` is the source of truth for tombstone state.
//! - `reminder_at <= 0` means the note has no reminder.
//! - A repeating note always carries a positive `reminder_at`.

use crate::model::reminder::RepeatFrequency;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Storage row id of a note.
pub type NoteId = i64;

/// Stable identifier used for alarm keys and cross-process references.
pub type NoteUuid = Uuid;

/// Canonical note record.
///
/// All timestamps are Unix epoch milliseconds, `0` meaning "unset".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Row id assigned by storage. `0` until the note is created.
    pub id: NoteId,
    pub uuid: NoteUuid,
    /// Owning page row id, `0` for the inbox.
    pub page_id: i64,
    /// Markdown body. The first line doubles as notification title.
    pub text: String,
    pub done: bool,
    pub reminder_at: i64,
    pub reminder_enabled: bool,
    pub repeat_frequency: RepeatFrequency,
    pub task_last_done_at: i64,
    /// Sort key for list placement; bumped when a reminder fires.
    pub order_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    /// Soft delete tombstone.
    pub deleted_at: i64,
}

impl Note {
    /// Creates a fresh note with a generated stable UUID.
    pub fn new(text: impl Into<String>, now_ms: i64) -> Self {
        Self::with_uuid(Uuid::new_v4(), text, now_ms)
    }

    /// Creates a fresh note with a caller-provided UUID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_uuid(uuid: NoteUuid, text: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: 0,
            uuid,
            page_id: 0,
            text: text.into(),
            done: false,
            reminder_at: 0,
            reminder_enabled: false,
            repeat_frequency: RepeatFrequency::None,
            task_last_done_at: 0,
            order_at: now_ms,
            created_at: now_ms,
            updated_at: now_ms,
            deleted_at: 0,
        }
    }

    /// Builder-style helper that arms a reminder.
    pub fn with_reminder(mut self, reminder_at: i64, frequency: RepeatFrequency) -> Self {
        self.reminder_at = reminder_at;
        self.reminder_enabled = true;
        self.repeat_frequency = frequency;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at > 0
    }

    pub fn soft_delete(&mut self, now_ms: i64) {
        self.deleted_at = now_ms;
        self.updated_at = now_ms;
    }

    pub fn restore(&mut self, now_ms: i64) {
        self.deleted_at = 0;
        self.updated_at = now_ms;
    }

    /// Returns whether the reminder fields describe an armed reminder.
    pub fn has_active_reminder(&self) -> bool {
        self.reminder_enabled && self.reminder_at > 0
    }

    /// First non-blank line of the body, trimmed.
    pub fn title_line(&self) -> &str {
        self.text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
    }

    /// Checks field-level invariants before persistence.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        for (field, value) in [
            ("reminder_at", self.reminder_at),
            ("task_last_done_at", self.task_last_done_at),
            ("order_at", self.order_at),
            ("created_at", self.created_at),
            ("updated_at", self.updated_at),
            ("deleted_at", self.deleted_at),
        ] {
            if value < 0 {
                return Err(NoteValidationError::NegativeTimestamp { field, value });
            }
        }

        if self.repeat_frequency.is_repeating() && self.reminder_at <= 0 {
            return Err(NoteValidationError::RepeatWithoutReminder(
                self.repeat_frequency,
            ));
        }

        Ok(())
    }
}

/// Note validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    NegativeTimestamp { field: &'static str, value: i64 },
    RepeatWithoutReminder(RepeatFrequency),
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeTimestamp { field, value } => {
                write!(f, "{field} must not be negative, got {value}")
            }
            Self::RepeatWithoutReminder(frequency) => write!(
                f,
                "repeat_frequency `{}` requires a positive reminder_at",
                frequency.as_str()
            ),
        }
    }
}

impl Error for NoteValidationError {}

#[cfg(test)]
mod tests {
    use super::{Note, NoteValidationError};
    use crate::model::reminder::RepeatFrequency;

    #[test]
    fn new_note_has_no_reminder() {
        let note = Note::new("buy milk", 1_000);
        assert!(!note.has_active_reminder());
        assert_eq!(note.repeat_frequency, RepeatFrequency::None);
        assert_eq!(note.order_at, 1_000);
        assert!(note.validate().is_ok());
    }

    #[test]
    fn title_line_skips_blank_lines() {
        let note = Note::new("\n\n  call mom  \nabout sunday", 1);
        assert_eq!(note.title_line(), "call mom");
    }

    #[test]
    fn validate_rejects_repeat_without_reminder() {
        let mut note = Note::new("water plants", 1);
        note.repeat_frequency = RepeatFrequency::Weekly;
        assert_eq!(
            note.validate(),
            Err(NoteValidationError::RepeatWithoutReminder(
                RepeatFrequency::Weekly
            ))
        );
    }

    #[test]
    fn validate_rejects_negative_timestamps() {
        let mut note = Note::new("x", 1);
        note.reminder_at = -5;
        let err = note.validate().expect_err("negative reminder must fail");
        assert!(err.to_string().contains("reminder_at"));
    }

    #[test]
    fn soft_delete_and_restore_roundtrip() {
        let mut note = Note::new("x", 1);
        note.soft_delete(50);
        assert!(note.is_deleted());
        note.restore(60);
        assert!(!note.is_deleted());
        assert_eq!(note.updated_at, 60);
    }
}
