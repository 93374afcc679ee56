//! Core reminder engine for Noteminder.
//! This crate is the single source of truth for note and reminder invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod reminder;
pub mod repo;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::note::{Note, NoteId, NoteUuid, NoteValidationError};
pub use model::reminder::{ReminderSpec, RepeatFrequency};
pub use reminder::alarm_key::AlarmKey;
pub use reminder::locks::NoteLockRegistry;
pub use reminder::permission::{
    PermissionEvent, PermissionFlow, PermissionProbe, PermissionState, RemedialAction,
};
pub use reminder::platform::{
    AlarmPayload, AlarmSink, CommandBuffer, NoopPlatform, NotificationAction,
    NotificationPresenter, PlatformCommand, PlatformError, PlatformProfile, PlatformResult,
};
pub use reminder::scheduler::{
    FireTrigger, OnFireReport, ReminderPlatform, ReminderScheduler, RescheduleReport,
    ScheduleOutcome, SchedulerError, SkipReason,
};
pub use repo::note_repo::{NoteStore, RepoError, RepoResult, SqliteNoteRepository};
pub use service::note_service::{NoteService, NoteServiceError, ReminderUpdate};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
