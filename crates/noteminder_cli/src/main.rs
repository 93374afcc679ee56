//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `noteminder_core` linkage.
//! - Dry-run the startup reschedule batch against a note database and print
//!   the alarms a device would register.
//!
//! Usage:
//! - `noteminder` prints ping/version.
//! - `noteminder reschedule-all [DB_PATH]` dry-runs the batch. Without
//!   `DB_PATH` the configured `NOTEMINDER_DB_PATH` is used.

use noteminder_core::db::open_db;
use noteminder_core::{
    init_logging_from_config, CommandBuffer, CoreConfig, PlatformCommand, PlatformProfile,
    ReminderPlatform, ReminderScheduler, SqliteNoteRepository,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("noteminder_core ping={}", noteminder_core::ping());
    println!("noteminder_core version={}", noteminder_core::core_version());

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => ExitCode::SUCCESS,
        Some("reschedule-all") => match reschedule_all_dry_run(args.next().map(PathBuf::from)) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
        Some(other) => {
            eprintln!("error: unknown command `{other}`; expected `reschedule-all [DB_PATH]`");
            ExitCode::from(2)
        }
    }
}

fn reschedule_all_dry_run(db_path: Option<PathBuf>) -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    init_logging_from_config(&config)?;
    let db_path = db_path.unwrap_or_else(|| config.db_path.clone());

    let conn = open_db(&db_path).map_err(|err| format!("open `{}`: {err}", db_path.display()))?;
    let repo = SqliteNoteRepository::try_new(&conn).map_err(|err| err.to_string())?;

    // Record alarms as a notification-center device would, whatever the host.
    let buffer = Arc::new(CommandBuffer::new(true));
    let platform = ReminderPlatform::new(
        PlatformProfile::NotificationCenter,
        buffer.clone(),
        buffer.clone(),
    );
    let report = ReminderScheduler::new(repo, platform)
        .reschedule_all_reminders()
        .map_err(|err| err.to_string())?;

    println!(
        "reschedule_all db={} scheduled={} skipped_past={} failed={}",
        db_path.display(),
        report.scheduled,
        report.skipped_past,
        report.failed
    );
    for command in buffer.drain() {
        if let PlatformCommand::ScheduleAlarm {
            key,
            request_code,
            fire_at,
            ..
        } = command
        {
            println!("alarm key={key} request_code={request_code} fire_at={fire_at}");
        }
    }
    Ok(())
}
