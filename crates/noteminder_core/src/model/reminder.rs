//! Reminder value types derived from notes.
//!
//! # Responsibility
//! - Define the repeat frequency vocabulary shared by storage and engine.
//! - Derive a `ReminderSpec` snapshot from a note's stored fields.
//!
//! # Invariants
//! - `ReminderSpec` is never persisted; it is rebuilt from the note on every
//!   scheduling decision.
//! - A spec is schedulable only when `fire_at > 0` and `enabled`.

use crate::model::note::{Note, NoteId, NoteUuid};
use serde::{Deserialize, Serialize};

/// Period at which a reminder re-arms itself after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatFrequency {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl RepeatFrequency {
    /// Stable storage string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// Parses a storage string. Unknown values return `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn is_repeating(self) -> bool {
        self != Self::None
    }
}

/// Reminder snapshot of one note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderSpec {
    pub note_id: NoteId,
    pub note_uuid: NoteUuid,
    pub fire_at: i64,
    pub enabled: bool,
    pub repeat_frequency: RepeatFrequency,
}

impl ReminderSpec {
    pub fn from_note(note: &Note) -> Self {
        Self {
            note_id: note.id,
            note_uuid: note.uuid,
            fire_at: note.reminder_at,
            enabled: note.reminder_enabled,
            repeat_frequency: note.repeat_frequency,
        }
    }

    /// Whether any scheduling action may be taken for this reminder.
    pub fn is_schedulable(&self) -> bool {
        self.enabled && self.fire_at > 0
    }

    /// Whether the reminder is schedulable and still ahead of `now_ms`.
    pub fn is_pending_after(&self, now_ms: i64) -> bool {
        self.is_schedulable() && self.fire_at > now_ms
    }
}
