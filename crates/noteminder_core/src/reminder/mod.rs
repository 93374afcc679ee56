//! Reminder scheduling engine.
//!
//! # Responsibility
//! - Compute recurrence and note transforms around reminder events.
//! - Drive the notification/exact-alarm permission flow.
//! - Orchestrate platform alarms and notifications against the note store.
//!
//! # Invariants
//! - Leaf modules (`recurrence`, `state`, `permission`, `alarm_key`) are pure.
//! - Only `scheduler` performs store or platform side effects.

pub mod alarm_key;
pub mod locks;
pub mod notification;
pub mod permission;
pub mod platform;
pub mod recurrence;
pub mod scheduler;
pub mod state;
