#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use noteminder_core::{
    AlarmKey, AlarmPayload, AlarmSink, ManualClock, Note, NoteStore, NoteUuid,
    NotificationAction, NotificationPresenter, PlatformError, PlatformProfile, PlatformResult,
    ReminderPlatform, ReminderScheduler, RepoError, RepoResult,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 2024-03-01T08:00:00Z
pub fn base_now() -> i64 {
    utc_ms(2024, 3, 1, 8, 0)
}

pub fn utc_ms(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
        .timestamp_millis()
}

pub const HOUR_MS: i64 = 60 * 60 * 1000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Schedule {
        key: AlarmKey,
        fire_at: i64,
        payload: AlarmPayload,
    },
    Cancel(AlarmKey),
    Notify {
        key: AlarmKey,
        title: String,
        body: String,
        actions: Vec<NotificationAction>,
    },
    Dismiss(AlarmKey),
}

/// Alarm sink and presenter that records every call.
#[derive(Debug)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    exact_alarms: AtomicBool,
    rejected: Mutex<HashSet<AlarmKey>>,
}

impl RecordingPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            exact_alarms: AtomicBool::new(true),
            rejected: Mutex::new(HashSet::new()),
        })
    }

    pub fn set_exact_alarms(&self, allowed: bool) {
        self.exact_alarms.store(allowed, Ordering::SeqCst);
    }

    /// Makes `schedule` fail for one note.
    pub fn reject_schedules_for(&self, note_uuid: NoteUuid) {
        self.rejected
            .lock()
            .unwrap()
            .insert(AlarmKey::for_note(note_uuid));
    }

    pub fn platform(self: &Arc<Self>, profile: PlatformProfile) -> ReminderPlatform {
        ReminderPlatform::new(profile, self.clone(), self.clone())
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn schedules(&self) -> Vec<(AlarmKey, i64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Schedule { key, fire_at, .. } => Some((key, fire_at)),
                _ => None,
            })
            .collect()
    }

    pub fn cancels(&self) -> Vec<AlarmKey> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Cancel(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<(AlarmKey, String, Vec<NotificationAction>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Notify {
                    key, title, actions, ..
                } => Some((key, title, actions)),
                _ => None,
            })
            .collect()
    }

    pub fn dismissals(&self) -> Vec<AlarmKey> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Dismiss(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AlarmSink for RecordingPlatform {
    fn schedule(&self, key: &AlarmKey, fire_at: i64, payload: &AlarmPayload) -> PlatformResult<()> {
        if self.rejected.lock().unwrap().contains(key) {
            return Err(PlatformError::Rejected {
                operation: "schedule",
                message: "injected failure".to_string(),
            });
        }
        self.record(PlatformCall::Schedule {
            key: *key,
            fire_at,
            payload: payload.clone(),
        });
        Ok(())
    }

    fn cancel(&self, key: &AlarmKey) -> PlatformResult<()> {
        self.record(PlatformCall::Cancel(*key));
        Ok(())
    }

    fn can_schedule_exact_alarms(&self) -> bool {
        self.exact_alarms.load(Ordering::SeqCst)
    }
}

impl NotificationPresenter for RecordingPlatform {
    fn notify(
        &self,
        key: &AlarmKey,
        title: &str,
        body: &str,
        actions: &[NotificationAction],
    ) -> PlatformResult<()> {
        self.record(PlatformCall::Notify {
            key: *key,
            title: title.to_string(),
            body: body.to_string(),
            actions: actions.to_vec(),
        });
        Ok(())
    }

    fn dismiss(&self, key: &AlarmKey) -> PlatformResult<()> {
        self.record(PlatformCall::Dismiss(*key));
        Ok(())
    }
}

/// Thread-safe in-memory store with failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    notes: Mutex<BTreeMap<NoteUuid, Note>>,
    next_id: AtomicI64,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, note: Note) -> Note {
        self.create(&note).unwrap()
    }

    pub fn note(&self, uuid: NoteUuid) -> Note {
        self.notes.lock().unwrap().get(&uuid).cloned().unwrap()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> RepoResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::InvalidData("injected write failure".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl NoteStore for MemoryStore {
    fn create(&self, note: &Note) -> RepoResult<Note> {
        note.validate()?;
        let mut created = note.clone();
        created.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.notes
            .lock()
            .unwrap()
            .insert(created.uuid, created.clone());
        Ok(created)
    }

    fn get_by_uuid(&self, uuid: NoteUuid) -> RepoResult<Option<Note>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::InvalidData("injected read failure".to_string()));
        }
        Ok(self.notes.lock().unwrap().get(&uuid).cloned())
    }

    fn list_with_active_reminders(&self) -> RepoResult<Vec<Note>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::InvalidData("injected read failure".to_string()));
        }
        let mut notes = self
            .notes
            .lock()
            .unwrap()
            .values()
            .filter(|note| note.has_active_reminder() && !note.is_deleted())
            .cloned()
            .collect::<Vec<_>>();
        notes.sort_by_key(|note| (note.reminder_at, note.uuid));
        Ok(notes)
    }

    fn update(&self, note: &Note) -> RepoResult<()> {
        note.validate()?;
        self.check_write()?;
        let mut notes = self.notes.lock().unwrap();
        match notes.get_mut(&note.uuid) {
            Some(stored) => {
                *stored = note.clone();
                Ok(())
            }
            None => Err(RepoError::NotFound(note.uuid)),
        }
    }

    fn update_if_reminder_at(&self, note: &Note, expected_reminder_at: i64) -> RepoResult<bool> {
        note.validate()?;
        self.check_write()?;
        let mut notes = self.notes.lock().unwrap();
        match notes.get_mut(&note.uuid) {
            Some(stored) if stored.reminder_at == expected_reminder_at && !stored.is_deleted() => {
                *stored = note.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn soft_delete(&self, uuid: NoteUuid, now_ms: i64) -> RepoResult<()> {
        self.check_write()?;
        let mut notes = self.notes.lock().unwrap();
        let note = notes.get_mut(&uuid).ok_or(RepoError::NotFound(uuid))?;
        note.soft_delete(now_ms);
        Ok(())
    }

    fn restore(&self, uuid: NoteUuid, now_ms: i64) -> RepoResult<()> {
        self.check_write()?;
        let mut notes = self.notes.lock().unwrap();
        let note = notes.get_mut(&uuid).ok_or(RepoError::NotFound(uuid))?;
        note.restore(now_ms);
        Ok(())
    }
}

/// Scheduler over `store` with a pinned UTC clock.
pub fn scheduler_with<S: NoteStore>(
    store: S,
    platform: &Arc<RecordingPlatform>,
    profile: PlatformProfile,
    now_ms: i64,
) -> (ReminderScheduler<S, Utc>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now_ms));
    let scheduler = ReminderScheduler::new(store, platform.platform(profile))
        .with_clock(clock.clone())
        .with_time_zone(Utc);
    (scheduler, clock)
}
