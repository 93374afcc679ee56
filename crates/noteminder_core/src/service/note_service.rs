//! Note use-case service.
//!
//! # Responsibility
//! - Provide the user-facing note actions that touch reminders: create,
//!   set/clear reminder, mark done/undone, delete, restore.
//! - Keep platform alarms consistent with every note write.
//!
//! # Invariants
//! - Every mutating call holds the note's lock across read, write and the
//!   matching platform call.
//! - A reminder is only armed while the permission gate allows scheduling.
//! - Soft-deleted notes never keep a pending alarm.

use crate::model::note::{Note, NoteUuid};
use crate::model::reminder::{ReminderSpec, RepeatFrequency};
use crate::reminder::permission::PermissionState;
use crate::reminder::platform::NotificationAction;
use crate::reminder::recurrence::next_fire_at_after;
use crate::reminder::scheduler::{ReminderScheduler, ScheduleOutcome};
use crate::reminder::state::{apply_clear_reminder, apply_done_effects, apply_undone_effects};
use crate::repo::note_repo::{NoteStore, RepoError};
use chrono::{Local, TimeZone};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// Target note does not exist or is soft-deleted.
    NoteNotFound(NoteUuid),
    /// Reminder time must be a positive epoch-millisecond value.
    InvalidReminderTime(i64),
    /// Permission gate has not reached a state that allows scheduling.
    PermissionRequired(PermissionState),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(uuid) => write!(f, "note not found: {uuid}"),
            Self::InvalidReminderTime(value) => {
                write!(f, "invalid reminder time `{value}`; expected a positive epoch ms")
            }
            Self::PermissionRequired(state) => write!(
                f,
                "reminder permission not granted (state `{}`)",
                state.as_str()
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(uuid) => Self::NoteNotFound(uuid),
            other => Self::Repo(other),
        }
    }
}

/// Result of arming a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderUpdate {
    pub note: Note,
    pub schedule: ScheduleOutcome,
}

/// Note service facade over a reminder scheduler.
pub struct NoteService<S: NoteStore, Tz: TimeZone = Local> {
    scheduler: ReminderScheduler<S, Tz>,
}

impl<S: NoteStore, Tz: TimeZone> NoteService<S, Tz> {
    pub fn new(scheduler: ReminderScheduler<S, Tz>) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &ReminderScheduler<S, Tz> {
        &self.scheduler
    }

    /// Creates one note on `page_id` from markdown text.
    pub fn create_note(
        &self,
        page_id: i64,
        text: impl Into<String>,
    ) -> Result<Note, NoteServiceError> {
        let mut note = Note::new(text, self.scheduler.now_ms());
        note.page_id = page_id;
        Ok(self.scheduler.store().create(&note)?)
    }

    /// Loads a live note.
    pub fn get_note(&self, uuid: NoteUuid) -> Result<Note, NoteServiceError> {
        self.load_live(uuid)
    }

    /// Arms or replaces the note's reminder and schedules its alarm.
    ///
    /// `gate` is the current outcome of the permission flow.
    pub fn set_reminder(
        &self,
        uuid: NoteUuid,
        reminder_at: i64,
        frequency: RepeatFrequency,
        gate: PermissionState,
    ) -> Result<ReminderUpdate, NoteServiceError> {
        if reminder_at <= 0 {
            return Err(NoteServiceError::InvalidReminderTime(reminder_at));
        }
        if !gate.allows_scheduling() {
            return Err(NoteServiceError::PermissionRequired(gate));
        }

        let _guard = self.scheduler.lock_note(uuid);
        let mut note = self.load_live(uuid)?;
        note.reminder_at = reminder_at;
        note.reminder_enabled = true;
        note.repeat_frequency = frequency;
        note.updated_at = self.scheduler.now_ms();
        self.scheduler.store().update(&note)?;

        let schedule = self.scheduler.schedule_locked(&note);
        info!(
            "event=reminder_set module=service status=ok note_uuid={} frequency={} scheduled={}",
            uuid,
            frequency.as_str(),
            schedule.is_scheduled()
        );
        Ok(ReminderUpdate { note, schedule })
    }

    /// Cancels the alarm and removes the reminder from the note.
    pub fn clear_reminder(&self, uuid: NoteUuid) -> Result<Note, NoteServiceError> {
        let _guard = self.scheduler.lock_note(uuid);
        let note = self.load_live(uuid)?;
        self.scheduler.cancel_locked(note.id, uuid);

        let cleared = apply_clear_reminder(&note, self.scheduler.now_ms());
        self.scheduler.store().update(&cleared)?;
        self.scheduler.dismiss_notification(uuid);
        Ok(cleared)
    }

    /// Completes the task. One-shot reminders are disarmed; repeating ones
    /// keep their pending alarm.
    pub fn mark_done(&self, uuid: NoteUuid) -> Result<Note, NoteServiceError> {
        let _guard = self.scheduler.lock_note(uuid);
        let note = self.load_live(uuid)?;
        let done = apply_done_effects(&note, self.scheduler.now_ms());
        self.scheduler.store().update(&done)?;

        if note.has_active_reminder() && !done.reminder_enabled {
            self.scheduler.cancel_locked(note.id, uuid);
        }
        self.scheduler.dismiss_notification(uuid);
        info!(
            "event=task_done module=service status=ok note_uuid={} reminder_enabled={}",
            uuid, done.reminder_enabled
        );
        Ok(done)
    }

    /// Reverts completion without touching the reminder.
    pub fn mark_undone(&self, uuid: NoteUuid) -> Result<Note, NoteServiceError> {
        let _guard = self.scheduler.lock_note(uuid);
        let note = self.load_live(uuid)?;
        let undone = apply_undone_effects(&note, self.scheduler.now_ms());
        self.scheduler.store().update(&undone)?;
        Ok(undone)
    }

    /// Moves the note to trash and drops its alarm and notification.
    pub fn delete_note(&self, uuid: NoteUuid) -> Result<(), NoteServiceError> {
        let _guard = self.scheduler.lock_note(uuid);
        let note = self.load_live(uuid)?;
        // Tombstone first: a failed write must leave the alarm armed.
        self.scheduler
            .store()
            .soft_delete(uuid, self.scheduler.now_ms())?;
        self.scheduler.cancel_locked(note.id, uuid);
        self.scheduler.dismiss_notification(uuid);
        info!("event=note_delete module=service status=ok note_uuid={uuid}");
        Ok(())
    }

    /// Restores a trashed note and re-arms its reminder if one is still ahead.
    pub fn restore_note(&self, uuid: NoteUuid) -> Result<Note, NoteServiceError> {
        let _guard = self.scheduler.lock_note(uuid);
        let mut note = self
            .scheduler
            .store()
            .get_by_uuid(uuid)?
            .ok_or(NoteServiceError::NoteNotFound(uuid))?;
        if !note.is_deleted() {
            return Ok(note);
        }

        let now_ms = self.scheduler.now_ms();
        self.scheduler.store().restore(uuid, now_ms)?;
        note.restore(now_ms);

        // Repeating reminders missed while trashed resume at the next occurrence.
        if note.has_active_reminder() && note.reminder_at <= now_ms {
            if let Some(next) = next_fire_at_after(
                self.scheduler.time_zone(),
                note.reminder_at,
                note.repeat_frequency,
                now_ms,
            ) {
                note.reminder_at = next;
                self.scheduler.store().update(&note)?;
            }
        }

        let rescheduled = ReminderSpec::from_note(&note).is_pending_after(now_ms)
            && self.scheduler.schedule_locked(&note).is_scheduled();
        info!(
            "event=note_restore module=service status=ok note_uuid={uuid} rescheduled={rescheduled}"
        );
        Ok(note)
    }

    /// Dispatches an action chosen on a fired notification.
    pub fn handle_notification_action(
        &self,
        uuid: NoteUuid,
        action: NotificationAction,
    ) -> Result<Note, NoteServiceError> {
        match action {
            NotificationAction::MarkDone => self.mark_done(uuid),
        }
    }

    fn load_live(&self, uuid: NoteUuid) -> Result<Note, NoteServiceError> {
        self.scheduler
            .store()
            .get_by_uuid(uuid)?
            .filter(|note| !note.is_deleted())
            .ok_or(NoteServiceError::NoteNotFound(uuid))
    }
}
