//! Per-note serialization of reminder operations.
//!
//! Operations on different notes never contend. Operations on the same note
//! run one at a time. A note only occupies the registry while held.

use crate::model::note::NoteUuid;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct NoteLockRegistry {
    busy: Mutex<HashSet<NoteUuid>>,
    released: Condvar,
}

/// Held while one operation owns a note.
#[must_use = "the note is released as soon as the guard is dropped"]
pub struct NoteLockGuard<'r> {
    registry: &'r NoteLockRegistry,
    note_uuid: NoteUuid,
}

impl NoteLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `note_uuid` is free and returns its guard.
    pub fn lock(&self, note_uuid: NoteUuid) -> NoteLockGuard<'_> {
        let mut busy = self.busy_set();
        while busy.contains(&note_uuid) {
            busy = self
                .released
                .wait(busy)
                .unwrap_or_else(PoisonError::into_inner);
        }
        busy.insert(note_uuid);

        NoteLockGuard {
            registry: self,
            note_uuid,
        }
    }

    /// Number of notes currently held.
    pub fn active_len(&self) -> usize {
        self.busy_set().len()
    }

    fn busy_set(&self) -> MutexGuard<'_, HashSet<NoteUuid>> {
        self.busy.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for NoteLockGuard<'_> {
    fn drop(&mut self) {
        self.registry.busy_set().remove(&self.note_uuid);
        self.registry.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::NoteLockRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn entries_are_reclaimed_after_release() {
        let registry = NoteLockRegistry::new();
        let note = Uuid::new_v4();
        {
            let _guard = registry.lock(note);
            assert_eq!(registry.active_len(), 1);
        }
        assert_eq!(registry.active_len(), 0);
    }

    #[test]
    fn different_notes_do_not_block_each_other() {
        let registry = NoteLockRegistry::new();
        let _a = registry.lock(Uuid::new_v4());
        let _b = registry.lock(Uuid::new_v4());
        assert_eq!(registry.active_len(), 2);
    }

    #[test]
    fn same_note_is_serialized() {
        let registry = Arc::new(NoteLockRegistry::new());
        let note = Uuid::new_v4();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let _guard = registry.lock(note);
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(registry.active_len(), 0);
    }
}
