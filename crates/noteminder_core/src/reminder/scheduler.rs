//! Reminder scheduling orchestration.
//!
//! # Responsibility
//! - Turn note reminder fields into platform alarm requests.
//! - Handle fired alarms: advance recurrence, persist, re-arm, notify.
//! - Rebuild the platform alarm registry after process start or reboot.
//!
//! # Invariants
//! - At most one pending alarm per note; keys derive from `note_uuid`.
//! - `on_fire` updates the note with a compare-and-set on the `reminder_at`
//!   that triggered it, so a duplicate delivery never advances twice.
//! - Operations on one note are serialized through `NoteLockRegistry`.
//! - Platform failures are logged and never abort a call or a batch.

use crate::clock::{Clock, SystemClock};
use crate::model::note::{Note, NoteId, NoteUuid};
use crate::model::reminder::ReminderSpec;
use crate::reminder::alarm_key::AlarmKey;
use crate::reminder::locks::{NoteLockGuard, NoteLockRegistry};
use crate::reminder::notification::NotificationContent;
use crate::reminder::platform::{
    AlarmPayload, AlarmSink, NoopPlatform, NotificationAction, NotificationPresenter,
    PlatformProfile,
};
use crate::reminder::state::apply_fire_effects_in;
use crate::repo::note_repo::{NoteStore, RepoError};
use chrono::{Local, TimeZone};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Alarms may be delivered slightly ahead of their nominal time.
const EARLY_FIRE_TOLERANCE_MS: i64 = 60_000;

const FIRE_ACTIONS: &[NotificationAction] = &[NotificationAction::MarkDone];

/// Errors surfaced by scheduler operations.
#[derive(Debug)]
pub enum SchedulerError {
    /// Note store failure. For `on_fire`, `notified` tells whether the
    /// notification was still shown from last-known text.
    Store {
        operation: &'static str,
        notified: bool,
        source: RepoError,
    },
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store {
                operation, source, ..
            } => write!(f, "reminder {operation} failed: {source}"),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store { source, .. } => Some(source),
        }
    }
}

/// Why `schedule_reminder` did not register an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `fire_at <= 0` or reminder disabled.
    NoReminder,
    /// Platform profile has no alarm delivery.
    NoAlarmDelivery,
    /// Exact-alarm capability is missing on an alarm-manager platform.
    ExactAlarmUnavailable,
    /// The sink rejected the request.
    PlatformFailed,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoReminder => "no_reminder",
            Self::NoAlarmDelivery => "no_alarm_delivery",
            Self::ExactAlarmUnavailable => "exact_alarm_unavailable",
            Self::PlatformFailed => "platform_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { key: AlarmKey, fire_at: i64 },
    Skipped(SkipReason),
}

impl ScheduleOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled { .. })
    }
}

/// Summary of one `reschedule_all_reminders` batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RescheduleReport {
    pub scheduled: usize,
    /// Enabled reminders whose fire time already passed.
    pub skipped_past: usize,
    /// Reminders the platform did not accept.
    pub failed: usize,
}

/// What `on_fire` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFireReport {
    /// Note missing or soft-deleted; alarm cancelled.
    Stale,
    /// The note already moved past this fire; nothing changed.
    AlreadyHandled,
    Fired { next_fire_at: i64, rescheduled: bool },
}

/// Identifies one alarm delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireTrigger {
    pub note_uuid: NoteUuid,
    /// Fire time the alarm was registered for, when the platform kept it.
    pub fire_at: Option<i64>,
    /// Note text captured at schedule time.
    pub text: Option<String>,
}

impl FireTrigger {
    pub fn for_note(note_uuid: NoteUuid) -> Self {
        Self {
            note_uuid,
            fire_at: None,
            text: None,
        }
    }

    pub fn from_payload(payload: &AlarmPayload) -> Self {
        Self {
            note_uuid: payload.note_uuid,
            fire_at: Some(payload.fire_at),
            text: Some(payload.text.clone()),
        }
    }
}

/// Platform collaborators selected at startup.
#[derive(Clone)]
pub struct ReminderPlatform {
    pub profile: PlatformProfile,
    pub alarms: Arc<dyn AlarmSink>,
    pub notifier: Arc<dyn NotificationPresenter>,
}

impl ReminderPlatform {
    pub fn new(
        profile: PlatformProfile,
        alarms: Arc<dyn AlarmSink>,
        notifier: Arc<dyn NotificationPresenter>,
    ) -> Self {
        Self {
            profile,
            alarms,
            notifier,
        }
    }

    /// Desktop profile wired to the no-op backend.
    pub fn desktop() -> Self {
        let noop = Arc::new(NoopPlatform);
        Self::new(PlatformProfile::Desktop, noop.clone(), noop)
    }

    /// Shows the notification for a fired reminder built from note `text`.
    ///
    /// Needs no note store, so a fire whose store is unreachable can still
    /// reach the user. Returns whether the presenter accepted it.
    pub fn show_fired(&self, note_uuid: NoteUuid, text: &str) -> bool {
        let key = AlarmKey::for_note(note_uuid);
        let content = NotificationContent::from_text(text);
        match self
            .notifier
            .notify(&key, &content.title, &content.body, FIRE_ACTIONS)
        {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "event=notification_show module=reminder status=error key={key} error={err}"
                );
                false
            }
        }
    }
}

/// Reminder engine over one note store.
pub struct ReminderScheduler<S: NoteStore, Tz: TimeZone = Local> {
    store: S,
    platform: ReminderPlatform,
    clock: Arc<dyn Clock>,
    locks: Arc<NoteLockRegistry>,
    tz: Tz,
}

impl<S: NoteStore> ReminderScheduler<S, Local> {
    /// Creates a scheduler using the system clock and device time zone.
    pub fn new(store: S, platform: ReminderPlatform) -> Self {
        Self {
            store,
            platform,
            clock: Arc::new(SystemClock),
            locks: Arc::new(NoteLockRegistry::new()),
            tz: Local,
        }
    }
}

impl<S: NoteStore, Tz: TimeZone> ReminderScheduler<S, Tz> {
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Shares a lock registry with other schedulers in the process.
    pub fn with_locks(mut self, locks: Arc<NoteLockRegistry>) -> Self {
        self.locks = locks;
        self
    }

    /// Evaluates recurrence in `tz` instead of the device zone.
    pub fn with_time_zone<Tz2: TimeZone>(self, tz: Tz2) -> ReminderScheduler<S, Tz2> {
        ReminderScheduler {
            store: self.store,
            platform: self.platform,
            clock: self.clock,
            locks: self.locks,
            tz,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn platform(&self) -> &ReminderPlatform {
        &self.platform
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Zone recurrence is evaluated in.
    pub fn time_zone(&self) -> &Tz {
        &self.tz
    }

    pub(crate) fn lock_note(&self, note_uuid: NoteUuid) -> NoteLockGuard<'_> {
        self.locks.lock(note_uuid)
    }

    /// Registers (or replaces) the platform alarm for `note`.
    ///
    /// No platform call is made when the reminder is absent or disabled.
    pub fn schedule_reminder(&self, note: &Note) -> ScheduleOutcome {
        let _guard = self.lock_note(note.uuid);
        self.schedule_locked(note)
    }

    /// Cancels the pending alarm for a note. Missing alarms are not an error.
    pub fn cancel_reminder(&self, note_id: NoteId, note_uuid: NoteUuid) {
        let _guard = self.lock_note(note_uuid);
        self.cancel_locked(note_id, note_uuid);
    }

    /// Re-registers every live, enabled, future reminder.
    ///
    /// Reminders already in the past are skipped rather than fired in a burst.
    pub fn reschedule_all_reminders(&self) -> Result<RescheduleReport, SchedulerError> {
        let now_ms = self.now_ms();
        let notes = self
            .store
            .list_with_active_reminders()
            .map_err(|source| {
                error!(
                    "event=reminder_reschedule_all module=reminder status=error error_code=store_list_failed error={source}"
                );
                SchedulerError::Store {
                    operation: "reschedule_all",
                    notified: false,
                    source,
                }
            })?;

        let mut report = RescheduleReport::default();
        for note in &notes {
            if !ReminderSpec::from_note(note).is_pending_after(now_ms) {
                report.skipped_past += 1;
                continue;
            }
            match self.schedule_reminder(note) {
                ScheduleOutcome::Scheduled { .. } => report.scheduled += 1,
                ScheduleOutcome::Skipped(_) => report.failed += 1,
            }
        }

        info!(
            "event=reminder_reschedule_all module=reminder status=ok total={} scheduled={} skipped_past={} failed={}",
            notes.len(),
            report.scheduled,
            report.skipped_past,
            report.failed
        );
        Ok(report)
    }

    /// Handles a delivered alarm.
    ///
    /// Safe to call repeatedly for the same delivery: once the note's
    /// `reminder_at` moved on, later calls report `AlreadyHandled`.
    pub fn on_fire(&self, trigger: &FireTrigger) -> Result<OnFireReport, SchedulerError> {
        let _guard = self.lock_note(trigger.note_uuid);
        let now_ms = self.now_ms();

        let note = match self.store.get_by_uuid(trigger.note_uuid) {
            Ok(Some(note)) if !note.is_deleted() => note,
            Ok(stale) => {
                info!(
                    "event=reminder_fire module=reminder status=stale note_uuid={} reason={}",
                    trigger.note_uuid,
                    if stale.is_some() { "deleted" } else { "missing" }
                );
                self.cancel_locked(stale.map_or(0, |note| note.id), trigger.note_uuid);
                return Ok(OnFireReport::Stale);
            }
            Err(source) => {
                error!(
                    "event=reminder_fire module=reminder status=error note_uuid={} error_code=store_read_failed error={source}",
                    trigger.note_uuid
                );
                let notified = match trigger.text.as_deref() {
                    Some(text) => self.platform.show_fired(trigger.note_uuid, text),
                    None => false,
                };
                return Err(SchedulerError::Store {
                    operation: "on_fire",
                    notified,
                    source,
                });
            }
        };

        if !self.is_due(&note, trigger, now_ms) {
            debug!(
                "event=reminder_fire module=reminder status=duplicate note_uuid={} reminder_at={}",
                note.uuid, note.reminder_at
            );
            return Ok(OnFireReport::AlreadyHandled);
        }

        let outcome = apply_fire_effects_in(&self.tz, &note, note.repeat_frequency, now_ms);
        match self
            .store
            .update_if_reminder_at(&outcome.note, note.reminder_at)
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    "event=reminder_fire module=reminder status=duplicate note_uuid={} reason=cas_miss",
                    note.uuid
                );
                return Ok(OnFireReport::AlreadyHandled);
            }
            Err(source) => {
                error!(
                    "event=reminder_fire module=reminder status=error note_uuid={} error_code=store_update_failed error={source}",
                    note.uuid
                );
                let notified = self.platform.show_fired(note.uuid, &note.text);
                return Err(SchedulerError::Store {
                    operation: "on_fire",
                    notified,
                    source,
                });
            }
        }

        let rescheduled =
            outcome.should_reschedule && self.schedule_locked(&outcome.note).is_scheduled();
        self.platform.show_fired(note.uuid, &outcome.note.text);

        info!(
            "event=reminder_fire module=reminder status=ok note_uuid={} frequency={} next_fire_at={} rescheduled={}",
            note.uuid,
            note.repeat_frequency.as_str(),
            outcome.next_fire_at,
            rescheduled
        );
        Ok(OnFireReport::Fired {
            next_fire_at: outcome.next_fire_at,
            rescheduled,
        })
    }

    pub(crate) fn schedule_locked(&self, note: &Note) -> ScheduleOutcome {
        let spec = ReminderSpec::from_note(note);
        if !spec.is_schedulable() {
            return ScheduleOutcome::Skipped(SkipReason::NoReminder);
        }

        let key = AlarmKey::for_note(spec.note_uuid);
        let profile = self.platform.profile;
        if !profile.delivers_alarms() {
            debug!(
                "event=reminder_schedule module=reminder status=skipped note_uuid={} reason=no_alarm_delivery profile={}",
                spec.note_uuid,
                profile.as_str()
            );
            return ScheduleOutcome::Skipped(SkipReason::NoAlarmDelivery);
        }
        if profile.requires_exact_alarm_capability()
            && !self.platform.alarms.can_schedule_exact_alarms()
        {
            warn!(
                "event=reminder_schedule module=reminder status=skipped note_uuid={} reason=exact_alarm_unavailable",
                spec.note_uuid
            );
            return ScheduleOutcome::Skipped(SkipReason::ExactAlarmUnavailable);
        }

        let payload = AlarmPayload::from_note(note);
        match self.platform.alarms.schedule(&key, spec.fire_at, &payload) {
            Ok(()) => {
                info!(
                    "event=reminder_schedule module=reminder status=ok note_uuid={} key={} fire_at={}",
                    spec.note_uuid, key, spec.fire_at
                );
                ScheduleOutcome::Scheduled {
                    key,
                    fire_at: spec.fire_at,
                }
            }
            Err(err) => {
                warn!(
                    "event=reminder_schedule module=reminder status=error note_uuid={} key={} error_code=platform_rejected error={err}",
                    spec.note_uuid, key
                );
                ScheduleOutcome::Skipped(SkipReason::PlatformFailed)
            }
        }
    }

    pub(crate) fn cancel_locked(&self, note_id: NoteId, note_uuid: NoteUuid) {
        let key = AlarmKey::for_note(note_uuid);
        match self.platform.alarms.cancel(&key) {
            Ok(()) => debug!(
                "event=reminder_cancel module=reminder status=ok note_id={note_id} note_uuid={note_uuid} key={key}"
            ),
            Err(err) => warn!(
                "event=reminder_cancel module=reminder status=error note_id={note_id} note_uuid={note_uuid} key={key} error={err}"
            ),
        }
    }

    pub(crate) fn dismiss_notification(&self, note_uuid: NoteUuid) {
        let key = AlarmKey::for_note(note_uuid);
        if let Err(err) = self.platform.notifier.dismiss(&key) {
            warn!(
                "event=notification_dismiss module=reminder status=error note_uuid={note_uuid} error={err}"
            );
        }
    }

    fn is_due(&self, note: &Note, trigger: &FireTrigger, now_ms: i64) -> bool {
        match trigger.fire_at {
            Some(expected) => note.reminder_at == expected,
            None => note.reminder_at <= now_ms.saturating_add(EARLY_FIRE_TOLERANCE_MS),
        }
    }

}
