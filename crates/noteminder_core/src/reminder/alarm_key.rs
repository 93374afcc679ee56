//! Deterministic alarm keys.
//!
//! The platform alarm registry outlives this process, so keys must be a pure
//! function of the note UUID: scheduling the same note twice replaces the
//! pending alarm instead of adding a second one.

use crate::model::note::NoteUuid;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Namespace for alarm keys derived with UUID v5.
pub const ALARM_KEY_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6e, 0x6f, 0x74, 0x65, 0x6d, 0x69, 0x4e, 0x64, 0x80, 0x72, 0x2d, 0x61, 0x6c, 0x61, 0x72,
    0x6d,
]);

/// Stable platform key for one note's alarm and notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmKey(Uuid);

impl AlarmKey {
    pub fn for_note(note_uuid: NoteUuid) -> Self {
        Self(Uuid::new_v5(&ALARM_KEY_NAMESPACE, note_uuid.as_bytes()))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Non-negative 31-bit code for integer-keyed registries.
    pub fn request_code(&self) -> i32 {
        let bytes = self.0.as_bytes();
        let raw = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        (raw & 0x7fff_ffff) as i32
    }
}

impl Display for AlarmKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "reminder-{}", self.0.as_simple())
    }
}
