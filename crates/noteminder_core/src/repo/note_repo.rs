//! Note store contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the note read/write contract consumed by the reminder engine.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Note::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Every write replaces the whole note record in one statement.
//! - `get_by_uuid` returns soft-deleted rows so callers can observe
//!   `deleted_at`; list queries never return them.

use crate::db::DbError;
use crate::model::note::{Note, NoteUuid, NoteValidationError};
use crate::model::reminder::RepeatFrequency;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    uuid,
    page_id,
    text,
    done,
    reminder_at,
    reminder_enabled,
    repeat_frequency,
    task_last_done_at,
    order_at,
    created_at,
    updated_at,
    deleted_at
FROM notes";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for note persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(NoteValidationError),
    Db(DbError),
    NotFound(NoteUuid),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(uuid) => write!(f, "note not found: {uuid}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Note persistence contract used by the reminder engine and note services.
pub trait NoteStore {
    /// Inserts a new note and returns it with its assigned row id.
    fn create(&self, note: &Note) -> RepoResult<Note>;
    /// Loads one note, including soft-deleted rows.
    fn get_by_uuid(&self, uuid: NoteUuid) -> RepoResult<Option<Note>>;
    /// Lists live notes whose reminder is enabled with a positive fire time,
    /// ordered by fire time.
    fn list_with_active_reminders(&self) -> RepoResult<Vec<Note>>;
    /// Replaces the stored record. Fails with `NotFound` for unknown notes.
    fn update(&self, note: &Note) -> RepoResult<()>;
    /// Replaces the stored record only while its `reminder_at` still equals
    /// `expected_reminder_at` and it is not soft-deleted.
    ///
    /// Returns `false` when another writer got there first.
    fn update_if_reminder_at(&self, note: &Note, expected_reminder_at: i64) -> RepoResult<bool>;
    /// Sets the soft-delete tombstone.
    fn soft_delete(&self, uuid: NoteUuid, now_ms: i64) -> RepoResult<()>;
    /// Clears the soft-delete tombstone.
    fn restore(&self, uuid: NoteUuid, now_ms: i64) -> RepoResult<()>;
}

impl<S: NoteStore + ?Sized> NoteStore for Arc<S> {
    fn create(&self, note: &Note) -> RepoResult<Note> {
        (**self).create(note)
    }

    fn get_by_uuid(&self, uuid: NoteUuid) -> RepoResult<Option<Note>> {
        (**self).get_by_uuid(uuid)
    }

    fn list_with_active_reminders(&self) -> RepoResult<Vec<Note>> {
        (**self).list_with_active_reminders()
    }

    fn update(&self, note: &Note) -> RepoResult<()> {
        (**self).update(note)
    }

    fn update_if_reminder_at(&self, note: &Note, expected_reminder_at: i64) -> RepoResult<bool> {
        (**self).update_if_reminder_at(note, expected_reminder_at)
    }

    fn soft_delete(&self, uuid: NoteUuid, now_ms: i64) -> RepoResult<()> {
        (**self).soft_delete(uuid, now_ms)
    }

    fn restore(&self, uuid: NoteUuid, now_ms: i64) -> RepoResult<()> {
        (**self).restore(uuid, now_ms)
    }
}

/// SQLite-backed note store.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_notes_table(conn)?;
        Ok(Self { conn })
    }

    fn write(&self, note: &Note, expected_reminder_at: Option<i64>) -> RepoResult<usize> {
        note.validate()?;

        let mut sql = String::from(
            "UPDATE notes
             SET
                page_id = ?2,
                text = ?3,
                done = ?4,
                reminder_at = ?5,
                reminder_enabled = ?6,
                repeat_frequency = ?7,
                task_last_done_at = ?8,
                order_at = ?9,
                updated_at = ?10,
                deleted_at = ?11
             WHERE uuid = ?1",
        );
        if expected_reminder_at.is_some() {
            sql.push_str(" AND reminder_at = ?12 AND deleted_at = 0");
        }

        let uuid = note.uuid.to_string();
        let changed = match expected_reminder_at {
            Some(expected) => self.conn.execute(
                &sql,
                params![
                    uuid,
                    note.page_id,
                    note.text.as_str(),
                    bool_to_int(note.done),
                    note.reminder_at,
                    bool_to_int(note.reminder_enabled),
                    note.repeat_frequency.as_str(),
                    note.task_last_done_at,
                    note.order_at,
                    note.updated_at,
                    note.deleted_at,
                    expected,
                ],
            )?,
            None => self.conn.execute(
                &sql,
                params![
                    uuid,
                    note.page_id,
                    note.text.as_str(),
                    bool_to_int(note.done),
                    note.reminder_at,
                    bool_to_int(note.reminder_enabled),
                    note.repeat_frequency.as_str(),
                    note.task_last_done_at,
                    note.order_at,
                    note.updated_at,
                    note.deleted_at,
                ],
            )?,
        };
        Ok(changed)
    }

    fn set_deleted_at(&self, uuid: NoteUuid, deleted_at: i64, now_ms: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET
                deleted_at = ?2,
                updated_at = ?3
             WHERE uuid = ?1;",
            params![uuid.to_string(), deleted_at, now_ms],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(uuid));
        }
        Ok(())
    }
}

impl NoteStore for SqliteNoteRepository<'_> {
    fn create(&self, note: &Note) -> RepoResult<Note> {
        note.validate()?;

        self.conn.execute(
            "INSERT INTO notes (
                uuid,
                page_id,
                text,
                done,
                reminder_at,
                reminder_enabled,
                repeat_frequency,
                task_last_done_at,
                order_at,
                created_at,
                updated_at,
                deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                note.uuid.to_string(),
                note.page_id,
                note.text.as_str(),
                bool_to_int(note.done),
                note.reminder_at,
                bool_to_int(note.reminder_enabled),
                note.repeat_frequency.as_str(),
                note.task_last_done_at,
                note.order_at,
                note.created_at,
                note.updated_at,
                note.deleted_at,
            ],
        )?;

        let mut created = note.clone();
        created.id = self.conn.last_insert_rowid();
        Ok(created)
    }

    fn get_by_uuid(&self, uuid: NoteUuid) -> RepoResult<Option<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let row = stmt
            .query_row([uuid.to_string()], |row| Ok(parse_note_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list_with_active_reminders(&self) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE reminder_enabled = 1
               AND reminder_at > 0
               AND deleted_at = 0
             ORDER BY reminder_at ASC, uuid ASC;"
        ))?;

        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn update(&self, note: &Note) -> RepoResult<()> {
        if self.write(note, None)? == 0 {
            return Err(RepoError::NotFound(note.uuid));
        }
        Ok(())
    }

    fn update_if_reminder_at(&self, note: &Note, expected_reminder_at: i64) -> RepoResult<bool> {
        Ok(self.write(note, Some(expected_reminder_at))? == 1)
    }

    fn soft_delete(&self, uuid: NoteUuid, now_ms: i64) -> RepoResult<()> {
        self.set_deleted_at(uuid, now_ms, now_ms)
    }

    fn restore(&self, uuid: NoteUuid, now_ms: i64) -> RepoResult<()> {
        self.set_deleted_at(uuid, 0, now_ms)
    }
}

fn ensure_notes_table(conn: &Connection) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'notes'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(RepoError::InvalidData(
            "notes table missing; open the connection through db::open_db".to_string(),
        ))
    }
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in notes.uuid"))
    })?;

    let frequency_text: String = row.get("repeat_frequency")?;
    let repeat_frequency = RepeatFrequency::parse(&frequency_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid repeat frequency `{frequency_text}` in notes.repeat_frequency"
        ))
    })?;

    let note = Note {
        id: row.get("id")?,
        uuid,
        page_id: row.get("page_id")?,
        text: row.get("text")?,
        done: parse_flag(row, "done")?,
        reminder_at: row.get("reminder_at")?,
        reminder_enabled: parse_flag(row, "reminder_enabled")?,
        repeat_frequency,
        task_last_done_at: row.get("task_last_done_at")?,
        order_at: row.get("order_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    };
    note.validate()?;
    Ok(note)
}

fn parse_flag(row: &Row<'_>, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid {column} value `{other}` in notes.{column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
