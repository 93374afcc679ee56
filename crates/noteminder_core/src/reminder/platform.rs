//! Platform delivery contracts.
//!
//! # Responsibility
//! - Define the narrow alarm and notification interfaces the engine drives.
//! - Select the capability set of the running platform.
//! - Provide the desktop no-op backend and a command buffer that hosts can
//!   replay against their native APIs.
//!
//! # Invariants
//! - Every call is keyed by `AlarmKey`; one pending alarm and one visible
//!   notification per note.
//! - Alarm payloads carry enough data to show the notification without a
//!   database read at fire time.

use crate::model::note::{Note, NoteId, NoteUuid};
use crate::reminder::alarm_key::AlarmKey;
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Failure reported by a platform backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The OS refused the request.
    Rejected {
        operation: &'static str,
        message: String,
    },
    /// The backend is not reachable (e.g. host shell not attached).
    Unavailable(String),
}

impl Display for PlatformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { operation, message } => {
                write!(f, "platform rejected {operation}: {message}")
            }
            Self::Unavailable(message) => write!(f, "platform unavailable: {message}"),
        }
    }
}

impl Error for PlatformError {}

/// Data delivered back with a fired alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmPayload {
    pub note_id: NoteId,
    pub note_uuid: NoteUuid,
    pub text: String,
    pub page_id: i64,
    pub fire_at: i64,
}

impl AlarmPayload {
    pub fn from_note(note: &Note) -> Self {
        Self {
            note_id: note.id,
            note_uuid: note.uuid,
            text: note.text.clone(),
            page_id: note.page_id,
            fire_at: note.reminder_at,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Action button attached to a reminder notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    MarkDone,
}

impl NotificationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MarkDone => "mark_done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "mark_done" => Some(Self::MarkDone),
            _ => None,
        }
    }
}

/// OS-owned alarm registry.
pub trait AlarmSink: Send + Sync {
    /// Registers an alarm, replacing any pending alarm with the same key.
    fn schedule(&self, key: &AlarmKey, fire_at: i64, payload: &AlarmPayload)
        -> PlatformResult<()>;
    /// Removes a pending alarm. Missing alarms are not an error.
    fn cancel(&self, key: &AlarmKey) -> PlatformResult<()>;
    fn can_schedule_exact_alarms(&self) -> bool;
}

/// User-visible notification surface.
pub trait NotificationPresenter: Send + Sync {
    fn notify(
        &self,
        key: &AlarmKey,
        title: &str,
        body: &str,
        actions: &[NotificationAction],
    ) -> PlatformResult<()>;
    fn dismiss(&self, key: &AlarmKey) -> PlatformResult<()>;
}

/// Capability set of the running platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformProfile {
    /// Alarm-manager style OS: wake-ups need the exact-alarm capability.
    AlarmManager,
    /// Local notification center: the OS fires scheduled notifications itself.
    NotificationCenter,
    /// No alarm delivery; scheduling is a logged no-op.
    Desktop,
}

impl PlatformProfile {
    /// Profile for the compile target.
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Self::AlarmManager
        } else if cfg!(any(target_os = "ios", target_os = "macos")) {
            Self::NotificationCenter
        } else {
            Self::Desktop
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlarmManager => "alarm_manager",
            Self::NotificationCenter => "notification_center",
            Self::Desktop => "desktop",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "alarm_manager" | "android" => Some(Self::AlarmManager),
            "notification_center" | "ios" | "macos" => Some(Self::NotificationCenter),
            "desktop" | "noop" => Some(Self::Desktop),
            _ => None,
        }
    }

    pub fn delivers_alarms(self) -> bool {
        !matches!(self, Self::Desktop)
    }

    pub fn requires_exact_alarm_capability(self) -> bool {
        matches!(self, Self::AlarmManager)
    }
}

/// Desktop backend: accepts every call and delivers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPlatform;

impl AlarmSink for NoopPlatform {
    fn schedule(
        &self,
        key: &AlarmKey,
        fire_at: i64,
        _payload: &AlarmPayload,
    ) -> PlatformResult<()> {
        debug!("event=alarm_schedule module=platform status=noop key={key} fire_at={fire_at}");
        Ok(())
    }

    fn cancel(&self, key: &AlarmKey) -> PlatformResult<()> {
        debug!("event=alarm_cancel module=platform status=noop key={key}");
        Ok(())
    }

    fn can_schedule_exact_alarms(&self) -> bool {
        false
    }
}

impl NotificationPresenter for NoopPlatform {
    fn notify(
        &self,
        key: &AlarmKey,
        _title: &str,
        _body: &str,
        _actions: &[NotificationAction],
    ) -> PlatformResult<()> {
        debug!("event=notification_show module=platform status=noop key={key}");
        Ok(())
    }

    fn dismiss(&self, key: &AlarmKey) -> PlatformResult<()> {
        debug!("event=notification_dismiss module=platform status=noop key={key}");
        Ok(())
    }
}

/// One platform call recorded by [`CommandBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCommand {
    ScheduleAlarm {
        key: String,
        request_code: i32,
        fire_at: i64,
        payload_json: String,
    },
    CancelAlarm {
        key: String,
        request_code: i32,
    },
    ShowNotification {
        key: String,
        request_code: i32,
        title: String,
        body: String,
        actions: Vec<NotificationAction>,
    },
    DismissNotification {
        key: String,
        request_code: i32,
    },
}

/// Records platform calls for a host shell to replay natively.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    exact_alarms: bool,
    commands: Mutex<Vec<PlatformCommand>>,
}

impl CommandBuffer {
    /// `exact_alarms` mirrors the host's current exact-alarm capability.
    pub fn new(exact_alarms: bool) -> Self {
        Self {
            exact_alarms,
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Takes all recorded commands in call order.
    pub fn drain(&self) -> Vec<PlatformCommand> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn push(&self, command: PlatformCommand) {
        self.lock().push(command);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PlatformCommand>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AlarmSink for CommandBuffer {
    fn schedule(&self, key: &AlarmKey, fire_at: i64, payload: &AlarmPayload) -> PlatformResult<()> {
        let payload_json = payload.to_json().map_err(|err| PlatformError::Rejected {
            operation: "schedule",
            message: format!("payload encoding failed: {err}"),
        })?;
        self.push(PlatformCommand::ScheduleAlarm {
            key: key.to_string(),
            request_code: key.request_code(),
            fire_at,
            payload_json,
        });
        Ok(())
    }

    fn cancel(&self, key: &AlarmKey) -> PlatformResult<()> {
        self.push(PlatformCommand::CancelAlarm {
            key: key.to_string(),
            request_code: key.request_code(),
        });
        Ok(())
    }

    fn can_schedule_exact_alarms(&self) -> bool {
        self.exact_alarms
    }
}

impl NotificationPresenter for CommandBuffer {
    fn notify(
        &self,
        key: &AlarmKey,
        title: &str,
        body: &str,
        actions: &[NotificationAction],
    ) -> PlatformResult<()> {
        self.push(PlatformCommand::ShowNotification {
            key: key.to_string(),
            request_code: key.request_code(),
            title: title.to_string(),
            body: body.to_string(),
            actions: actions.to_vec(),
        });
        Ok(())
    }

    fn dismiss(&self, key: &AlarmKey) -> PlatformResult<()> {
        self.push(PlatformCommand::DismissNotification {
            key: key.to_string(),
            request_code: key.request_code(),
        });
        Ok(())
    }
}
