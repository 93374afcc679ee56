//! Pure note transforms applied around reminder events.
//!
//! # Responsibility
//! - Describe how a note changes when its reminder fires or the task is
//!   completed, without touching storage or the platform.
//!
//! # Invariants
//! - A one-shot reminder is never auto-renewed by a fire.
//! - Completing one occurrence of a repeating task keeps its reminder armed.
//! - `should_reschedule` is only true for a strictly future next fire time.

use crate::model::note::Note;
use crate::model::reminder::RepeatFrequency;
use crate::reminder::recurrence;
use chrono::{Local, TimeZone};

/// Result of applying fire effects to a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireOutcome {
    pub note: Note,
    /// Fire time after the transform. Equals the previous value for one-shot
    /// or disabled reminders.
    pub next_fire_at: i64,
    pub should_reschedule: bool,
}

/// Applies the effects of a reminder firing, using the device time zone.
pub fn apply_fire_effects(note: &Note, frequency: RepeatFrequency, now_ms: i64) -> FireOutcome {
    apply_fire_effects_in(&Local, note, frequency, now_ms)
}

/// Applies the effects of a reminder firing in `tz`.
pub fn apply_fire_effects_in<Tz: TimeZone>(
    tz: &Tz,
    note: &Note,
    frequency: RepeatFrequency,
    now_ms: i64,
) -> FireOutcome {
    let mut updated = note.clone();
    updated.done = false;
    updated.order_at = now_ms;
    updated.updated_at = now_ms;

    let advances = frequency.is_repeating() && note.reminder_enabled && note.reminder_at > 0;
    if advances {
        updated.reminder_at = recurrence::next_fire_at_in(tz, note.reminder_at, frequency);
    }

    let next_fire_at = updated.reminder_at;
    FireOutcome {
        should_reschedule: advances && next_fire_at > now_ms,
        next_fire_at,
        note: updated,
    }
}

/// Applies manual completion of a task.
pub fn apply_done_effects(note: &Note, now_ms: i64) -> Note {
    let mut updated = note.clone();
    updated.done = true;
    updated.task_last_done_at = now_ms;
    updated.updated_at = now_ms;
    if !note.repeat_frequency.is_repeating() {
        updated.reminder_enabled = false;
    }
    updated
}

/// Reverts a manual completion. Reminder fields are left as they are.
pub fn apply_undone_effects(note: &Note, now_ms: i64) -> Note {
    let mut updated = note.clone();
    updated.done = false;
    updated.updated_at = now_ms;
    updated
}

/// Removes the reminder from a note entirely.
pub fn apply_clear_reminder(note: &Note, now_ms: i64) -> Note {
    let mut updated = note.clone();
    updated.reminder_at = 0;
    updated.reminder_enabled = false;
    updated.repeat_frequency = RepeatFrequency::None;
    updated.updated_at = now_ms;
    updated
}
