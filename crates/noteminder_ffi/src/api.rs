//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose note/reminder use-cases to Dart via FRB.
//! - Run the reminder engine against the on-disk note store and hand the
//!   resulting platform commands back to the host shell to execute.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures are reported with `ok=false` and a diagnostic message.
//! - Commands are returned in the order the engine issued them, also on
//!   failure, so a notification shown during a failed fire still reaches
//!   the user.
//! - All calls in the process share one per-note lock registry.

use log::error;
use noteminder_core::db::open_db;
use noteminder_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AlarmPayload, CommandBuffer, CoreConfig, FireTrigger, NoteLockRegistry, NoteService,
    NotificationAction, OnFireReport, PermissionState, PlatformCommand, PlatformProfile,
    ReminderPlatform, ReminderScheduler, RepeatFrequency, SqliteNoteRepository,
};
use once_cell::sync::{Lazy, OnceCell};
use std::sync::Arc;
use uuid::Uuid;

static CORE_CONFIG: OnceCell<CoreConfig> = OnceCell::new();
static NOTE_LOCKS: Lazy<Arc<NoteLockRegistry>> = Lazy::new(|| Arc::new(NoteLockRegistry::new()));

type FfiNoteService<'conn> = NoteService<SqliteNoteRepository<'conn>>;

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One native platform call the host must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCommandItem {
    /// `schedule_alarm|cancel_alarm|show_notification|dismiss_notification`.
    pub kind: String,
    /// Stable string key of the note's alarm/notification.
    pub key: String,
    /// Integer key for registries that need one.
    pub request_code: i32,
    pub fire_at: Option<i64>,
    /// JSON alarm payload to hand back to `reminder_on_fire`.
    pub payload_json: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    /// Notification action ids (`mark_done`).
    pub actions: Vec<String>,
}

/// Response envelope for note/reminder actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderActionResponse {
    pub ok: bool,
    pub note_uuid: Option<String>,
    /// Effective reminder time after the action, `0` for none.
    pub reminder_at: i64,
    pub message: String,
    pub commands: Vec<PlatformCommandItem>,
}

impl ReminderActionResponse {
    fn success(
        message: impl Into<String>,
        note_uuid: String,
        reminder_at: i64,
        commands: Vec<PlatformCommandItem>,
    ) -> Self {
        Self {
            ok: true,
            note_uuid: Some(note_uuid),
            reminder_at,
            message: message.into(),
            commands,
        }
    }

    fn failure(message: impl Into<String>, commands: Vec<PlatformCommandItem>) -> Self {
        Self {
            ok: false,
            note_uuid: None,
            reminder_at: 0,
            message: message.into(),
            commands,
        }
    }
}

/// Response envelope for a delivered alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderFireResponse {
    pub ok: bool,
    /// `stale|already_handled|fired|error`.
    pub status: String,
    pub next_fire_at: Option<i64>,
    pub rescheduled: bool,
    pub message: String,
    pub commands: Vec<PlatformCommandItem>,
}

/// Response envelope for the startup/boot reschedule batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescheduleAllResponse {
    pub ok: bool,
    pub scheduled: u32,
    pub skipped_past: u32,
    pub failed: u32,
    pub message: String,
    pub commands: Vec<PlatformCommandItem>,
}

/// Creates a note on `page_id`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn note_create(page_id: i64, text: String) -> ReminderActionResponse {
    action_response("note_create", "Note created.", false, |service| {
        service
            .create_note(page_id, text)
            .map_err(|err| err.to_string())
    })
}

/// Arms a reminder and schedules its alarm.
///
/// Input semantics:
/// - `frequency`: `none|daily|weekly|monthly|quarterly|yearly`.
/// - `permission_granted`: outcome of the host's permission flow.
/// - `exact_alarms`: whether the host can currently set exact alarms.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_set(
    note_uuid: String,
    reminder_at_ms: i64,
    frequency: String,
    permission_granted: bool,
    exact_alarms: bool,
) -> ReminderActionResponse {
    let Some(frequency) = RepeatFrequency::parse(&frequency) else {
        return ReminderActionResponse::failure(
            format!("reminder_set failed: unknown frequency `{frequency}`"),
            Vec::new(),
        );
    };
    let gate = if permission_granted {
        PermissionState::AllGranted
    } else {
        PermissionState::Denied
    };
    action_response("reminder_set", "Reminder set.", exact_alarms, |service| {
        let uuid = parse_note_uuid(&note_uuid)?;
        service
            .set_reminder(uuid, reminder_at_ms, frequency, gate)
            .map(|update| update.note)
            .map_err(|err| err.to_string())
    })
}

/// Cancels the alarm and removes the reminder.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_clear(note_uuid: String) -> ReminderActionResponse {
    action_response("reminder_clear", "Reminder cleared.", false, |service| {
        let uuid = parse_note_uuid(&note_uuid)?;
        service.clear_reminder(uuid).map_err(|err| err.to_string())
    })
}

/// Marks the task done.
#[flutter_rust_bridge::frb(sync)]
pub fn task_mark_done(note_uuid: String) -> ReminderActionResponse {
    action_response("task_mark_done", "Task done.", false, |service| {
        let uuid = parse_note_uuid(&note_uuid)?;
        service.mark_done(uuid).map_err(|err| err.to_string())
    })
}

/// Reverts task completion.
#[flutter_rust_bridge::frb(sync)]
pub fn task_mark_undone(note_uuid: String) -> ReminderActionResponse {
    action_response("task_mark_undone", "Task reopened.", false, |service| {
        let uuid = parse_note_uuid(&note_uuid)?;
        service.mark_undone(uuid).map_err(|err| err.to_string())
    })
}

/// Moves a note to trash, dropping its alarm.
#[flutter_rust_bridge::frb(sync)]
pub fn note_delete(note_uuid: String) -> ReminderActionResponse {
    match with_note_service(false, |service| {
        let uuid = parse_note_uuid(&note_uuid)?;
        service.delete_note(uuid).map_err(|err| err.to_string())
    }) {
        Ok((Ok(()), commands)) => {
            ReminderActionResponse::success("Note deleted.", note_uuid, 0, commands)
        }
        Ok((Err(err), commands)) => {
            ReminderActionResponse::failure(format!("note_delete failed: {err}"), commands)
        }
        Err(err) => ReminderActionResponse::failure(format!("note_delete failed: {err}"), Vec::new()),
    }
}

/// Restores a trashed note and re-arms a future reminder.
#[flutter_rust_bridge::frb(sync)]
pub fn note_restore(note_uuid: String, exact_alarms: bool) -> ReminderActionResponse {
    action_response("note_restore", "Note restored.", exact_alarms, |service| {
        let uuid = parse_note_uuid(&note_uuid)?;
        service.restore_note(uuid).map_err(|err| err.to_string())
    })
}

/// Handles an action button pressed on a reminder notification.
#[flutter_rust_bridge::frb(sync)]
pub fn notification_action(note_uuid: String, action: String) -> ReminderActionResponse {
    let Some(action) = NotificationAction::parse(&action) else {
        return ReminderActionResponse::failure(
            format!("notification_action failed: unknown action `{action}`"),
            Vec::new(),
        );
    };
    action_response("notification_action", "Action applied.", false, |service| {
        let uuid = parse_note_uuid(&note_uuid)?;
        service
            .handle_notification_action(uuid, action)
            .map_err(|err| err.to_string())
    })
}

/// Handles a delivered alarm using the payload stored at schedule time.
///
/// # FFI contract
/// - Safe to call more than once for the same delivery.
/// - On store failure the notification command is still returned, also when
///   the database cannot be opened at all (built from payload text).
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_on_fire(payload_json: String, exact_alarms: bool) -> ReminderFireResponse {
    let trigger = match AlarmPayload::from_json(&payload_json) {
        Ok(payload) => FireTrigger::from_payload(&payload),
        Err(err) => {
            return fire_failure(format!("reminder_on_fire failed: bad payload: {err}"), Vec::new())
        }
    };

    fire_with_config(resolve_config(), &trigger, exact_alarms)
}

fn fire_with_config(
    config: Result<&CoreConfig, String>,
    trigger: &FireTrigger,
    exact_alarms: bool,
) -> ReminderFireResponse {
    let profile = config
        .as_ref()
        .map_or_else(|_| PlatformProfile::current(), |config| config.platform);
    let outcome = config.and_then(|config| {
        with_note_service_in(config, exact_alarms, |service| {
            service.scheduler().on_fire(trigger)
        })
    });

    match outcome {
        Ok((Ok(report), commands)) => {
            let (status, next_fire_at, rescheduled) = match report {
                OnFireReport::Stale => ("stale", None, false),
                OnFireReport::AlreadyHandled => ("already_handled", None, false),
                OnFireReport::Fired {
                    next_fire_at,
                    rescheduled,
                } => ("fired", Some(next_fire_at), rescheduled),
            };
            ReminderFireResponse {
                ok: true,
                status: status.to_string(),
                next_fire_at,
                rescheduled,
                message: String::new(),
                commands,
            }
        }
        Ok((Err(err), commands)) => fire_failure(format!("reminder_on_fire failed: {err}"), commands),
        Err(err) => {
            let commands = notify_without_store(profile, trigger, exact_alarms);
            error!(
                "event=reminder_fire module=ffi status=error note_uuid={} error_code=session_failed notified={}",
                trigger.note_uuid,
                !commands.is_empty()
            );
            fire_failure(format!("reminder_on_fire failed: {err}"), commands)
        }
    }
}

/// Shows the fired notification from payload text when no store is reachable.
fn notify_without_store(
    profile: PlatformProfile,
    trigger: &FireTrigger,
    exact_alarms: bool,
) -> Vec<PlatformCommandItem> {
    let Some(text) = trigger.text.as_deref() else {
        return Vec::new();
    };
    let buffer = Arc::new(CommandBuffer::new(exact_alarms));
    let platform = ReminderPlatform::new(profile, buffer.clone(), buffer.clone());
    platform.show_fired(trigger.note_uuid, text);
    buffer.drain().into_iter().map(to_command_item).collect()
}

/// Re-registers all future reminders after app start or device reboot.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_reschedule_all(exact_alarms: bool) -> RescheduleAllResponse {
    match with_note_service(exact_alarms, |service| {
        service.scheduler().reschedule_all_reminders()
    }) {
        Ok((Ok(report), commands)) => RescheduleAllResponse {
            ok: true,
            scheduled: saturating_u32(report.scheduled),
            skipped_past: saturating_u32(report.skipped_past),
            failed: saturating_u32(report.failed),
            message: String::new(),
            commands,
        },
        Ok((Err(err), commands)) => reschedule_failure(err.to_string(), commands),
        Err(err) => reschedule_failure(err, Vec::new()),
    }
}

fn action_response(
    operation: &str,
    message: &str,
    exact_alarms: bool,
    f: impl FnOnce(&FfiNoteService<'_>) -> Result<noteminder_core::Note, String>,
) -> ReminderActionResponse {
    match with_note_service(exact_alarms, f) {
        Ok((Ok(note), commands)) => ReminderActionResponse::success(
            message,
            note.uuid.to_string(),
            if note.reminder_enabled { note.reminder_at } else { 0 },
            commands,
        ),
        Ok((Err(err), commands)) => {
            ReminderActionResponse::failure(format!("{operation} failed: {err}"), commands)
        }
        Err(err) => ReminderActionResponse::failure(format!("{operation} failed: {err}"), Vec::new()),
    }
}

fn with_note_service<T>(
    exact_alarms: bool,
    f: impl FnOnce(&FfiNoteService<'_>) -> T,
) -> Result<(T, Vec<PlatformCommandItem>), String> {
    with_note_service_in(resolve_config()?, exact_alarms, f)
}

fn with_note_service_in<T>(
    config: &CoreConfig,
    exact_alarms: bool,
    f: impl FnOnce(&FfiNoteService<'_>) -> T,
) -> Result<(T, Vec<PlatformCommandItem>), String> {
    let conn = open_db(&config.db_path).map_err(|err| {
        error!("event=ffi_session module=ffi status=error error_code=db_open_failed");
        format!("note DB open failed: {err}")
    })?;
    let repo = SqliteNoteRepository::try_new(&conn).map_err(|err| {
        error!("event=ffi_session module=ffi status=error error_code=repo_init_failed");
        format!("note repo init failed: {err}")
    })?;

    let buffer = Arc::new(CommandBuffer::new(exact_alarms));
    let platform = ReminderPlatform::new(config.platform, buffer.clone(), buffer.clone());
    let scheduler = ReminderScheduler::new(repo, platform).with_locks(Arc::clone(&NOTE_LOCKS));
    let service = NoteService::new(scheduler);

    let value = f(&service);
    let commands = buffer.drain().into_iter().map(to_command_item).collect();
    Ok((value, commands))
}

fn resolve_config() -> Result<&'static CoreConfig, String> {
    CORE_CONFIG
        .get_or_try_init(CoreConfig::from_env)
        .map_err(|err| format!("config resolution failed: {err}"))
}

fn parse_note_uuid(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid note uuid `{raw}`"))
}

fn to_command_item(command: PlatformCommand) -> PlatformCommandItem {
    let base = |kind: &str, key: String, request_code: i32| PlatformCommandItem {
        kind: kind.to_string(),
        key,
        request_code,
        fire_at: None,
        payload_json: None,
        title: None,
        body: None,
        actions: Vec::new(),
    };

    match command {
        PlatformCommand::ScheduleAlarm {
            key,
            request_code,
            fire_at,
            payload_json,
        } => PlatformCommandItem {
            fire_at: Some(fire_at),
            payload_json: Some(payload_json),
            ..base("schedule_alarm", key, request_code)
        },
        PlatformCommand::CancelAlarm { key, request_code } => {
            base("cancel_alarm", key, request_code)
        }
        PlatformCommand::ShowNotification {
            key,
            request_code,
            title,
            body,
            actions,
        } => PlatformCommandItem {
            title: Some(title),
            body: Some(body),
            actions: actions
                .into_iter()
                .map(|action| action.as_str().to_string())
                .collect(),
            ..base("show_notification", key, request_code)
        },
        PlatformCommand::DismissNotification { key, request_code } => {
            base("dismiss_notification", key, request_code)
        }
    }
}

fn fire_failure(message: String, commands: Vec<PlatformCommandItem>) -> ReminderFireResponse {
    ReminderFireResponse {
        ok: false,
        status: "error".to_string(),
        next_fire_at: None,
        rescheduled: false,
        message,
        commands,
    }
}

fn reschedule_failure(err: String, commands: Vec<PlatformCommandItem>) -> RescheduleAllResponse {
    RescheduleAllResponse {
        ok: false,
        scheduled: 0,
        skipped_past: 0,
        failed: 0,
        message: format!("reminder_reschedule_all failed: {err}"),
        commands,
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, fire_with_config, init_logging, note_create, note_delete, note_restore,
        notification_action, ping, reminder_clear, reminder_on_fire, reminder_reschedule_all,
        reminder_set, task_mark_undone,
    };
    use noteminder_core::{AlarmKey, AlarmPayload, CoreConfig, FireTrigger, PlatformProfile};
    use uuid::Uuid;

    const PAST_FIRE_AT: i64 = 1_000_000;

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn reminder_set_requires_permission() {
        let uuid = created_note_uuid("needs permission");
        let response = reminder_set(uuid, 4_102_444_800_000, "daily".into(), false, true);
        assert!(!response.ok);
        assert!(response.message.contains("permission"));
        assert!(response.commands.is_empty());
    }

    #[test]
    fn reminder_set_rejects_unknown_frequency() {
        let uuid = created_note_uuid("bad frequency");
        let response = reminder_set(uuid, 4_102_444_800_000, "hourly".into(), true, true);
        assert!(!response.ok);
        assert!(response.message.contains("hourly"));
    }

    #[test]
    fn reminder_set_and_clear_report_effective_reminder_time() {
        let uuid = created_note_uuid("call mom");
        let set = reminder_set(uuid.clone(), 4_102_444_800_000, "weekly".into(), true, true);
        assert!(set.ok, "{}", set.message);
        assert_eq!(set.reminder_at, 4_102_444_800_000);

        let cleared = reminder_clear(uuid);
        assert!(cleared.ok, "{}", cleared.message);
        assert_eq!(cleared.reminder_at, 0);
        assert!(cleared
            .commands
            .iter()
            .any(|command| command.kind == "cancel_alarm"));
    }

    #[test]
    fn on_fire_for_past_repeating_reminder_advances_and_notifies() {
        let uuid = created_note_uuid("water plants");
        let set = reminder_set(uuid.clone(), PAST_FIRE_AT, "daily".into(), true, true);
        assert!(set.ok, "{}", set.message);

        let payload = payload_json(&uuid, PAST_FIRE_AT, "water plants");
        let fired = reminder_on_fire(payload.clone(), true);
        assert!(fired.ok, "{}", fired.message);
        assert_eq!(fired.status, "fired");
        assert!(fired.next_fire_at.expect("next fire") > PAST_FIRE_AT);
        let notification = fired
            .commands
            .iter()
            .find(|command| command.kind == "show_notification")
            .expect("notification command");
        assert_eq!(notification.title.as_deref(), Some("water plants"));
        assert_eq!(notification.actions, vec!["mark_done".to_string()]);

        let duplicate = reminder_on_fire(payload, true);
        assert!(duplicate.ok, "{}", duplicate.message);
        assert_eq!(duplicate.status, "already_handled");
        assert!(duplicate.commands.is_empty());
    }

    #[test]
    fn on_fire_for_deleted_note_is_stale() {
        let uuid = created_note_uuid("old errand");
        let set = reminder_set(uuid.clone(), PAST_FIRE_AT, "none".into(), true, true);
        assert!(set.ok, "{}", set.message);
        assert!(note_delete(uuid.clone()).ok);

        let fired = reminder_on_fire(payload_json(&uuid, PAST_FIRE_AT, "old errand"), true);
        assert!(fired.ok, "{}", fired.message);
        assert_eq!(fired.status, "stale");
        assert_eq!(fired.commands.len(), 1);
        assert_eq!(fired.commands[0].kind, "cancel_alarm");

        let restored = note_restore(uuid, true);
        assert!(restored.ok, "{}", restored.message);
    }

    #[test]
    fn on_fire_with_unopenable_store_still_returns_notification() {
        let config = CoreConfig {
            db_path: std::env::temp_dir()
                .join(format!("noteminder-missing-{}", Uuid::new_v4()))
                .join("notes.sqlite3"),
            log_level: "info",
            log_dir: None,
            platform: PlatformProfile::AlarmManager,
        };
        let trigger = pills_trigger();

        let fired = fire_with_config(Ok(&config), &trigger, true);

        assert!(!fired.ok);
        assert_eq!(fired.status, "error");
        assert!(fired.message.contains("note DB open failed"), "{}", fired.message);
        assert_eq!(fired.commands.len(), 1);
        let notification = &fired.commands[0];
        assert_eq!(notification.kind, "show_notification");
        assert_eq!(
            notification.key,
            AlarmKey::for_note(trigger.note_uuid).to_string()
        );
        assert_eq!(notification.title.as_deref(), Some("take pills"));
        assert_eq!(notification.actions, vec!["mark_done".to_string()]);
    }

    #[test]
    fn on_fire_with_unresolved_config_still_returns_notification() {
        let fired = fire_with_config(
            Err("bad NOTEMINDER_PLATFORM".to_string()),
            &pills_trigger(),
            false,
        );

        assert!(!fired.ok);
        assert!(fired.message.contains("bad NOTEMINDER_PLATFORM"));
        assert_eq!(fired.commands.len(), 1);
        assert_eq!(fired.commands[0].kind, "show_notification");
    }

    #[test]
    fn on_fire_rejects_malformed_payload() {
        let fired = reminder_on_fire("{not json".to_string(), true);
        assert!(!fired.ok);
        assert_eq!(fired.status, "error");
    }

    #[test]
    fn notification_mark_done_completes_task() {
        let uuid = created_note_uuid("pay rent");
        let response = notification_action(uuid.clone(), "mark_done".into());
        assert!(response.ok, "{}", response.message);
        assert!(response
            .commands
            .iter()
            .any(|command| command.kind == "dismiss_notification"));

        assert!(task_mark_undone(uuid).ok);
    }

    #[test]
    fn unknown_note_uuid_fails_without_panicking() {
        let response = reminder_clear(Uuid::new_v4().to_string());
        assert!(!response.ok);
        assert!(response.message.contains("not found"));

        let invalid = reminder_clear("not-a-uuid".to_string());
        assert!(!invalid.ok);
    }

    #[test]
    fn reschedule_all_reports_counts() {
        let response = reminder_reschedule_all(true);
        assert!(response.ok, "{}", response.message);
    }

    fn created_note_uuid(text: &str) -> String {
        let created = note_create(0, text.to_string());
        assert!(created.ok, "{}", created.message);
        created.note_uuid.expect("created note should return uuid")
    }

    fn pills_trigger() -> FireTrigger {
        FireTrigger::from_payload(&AlarmPayload {
            note_id: 7,
            note_uuid: Uuid::new_v4(),
            text: "take pills".to_string(),
            page_id: 0,
            fire_at: PAST_FIRE_AT,
        })
    }

    fn payload_json(uuid: &str, fire_at: i64, text: &str) -> String {
        AlarmPayload {
            note_id: 0,
            note_uuid: Uuid::parse_str(uuid).expect("valid uuid"),
            text: text.to_string(),
            page_id: 0,
            fire_at,
        }
        .to_json()
        .expect("payload should encode")
    }
}
