//! Refresh orchestrator: decides what to show and when.
//!
//! `action` is the data model (`RefreshAction`, `RefreshRecord`),
//! `scheduler` the state machine that owns rotation state, and `worker` the
//! tokio task plus the `OrchestratorHandle` callers submit through.

pub mod action;
pub mod scheduler;
pub mod worker;

pub use action::{RefreshAction, RefreshKind, RefreshRecord};
pub use scheduler::{Clock, Plan, Scheduler, SchedulerState, SystemClock};
pub use worker::{OrchestratorHandle, RefreshOrchestrator};
