// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Leadflow dispatch engine.
//!
//! Provides the error type, domain enums and row types, phone normalization,
//! and the transport trait seam shared by every crate in the workspace.

pub mod error;
pub mod phone;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LeadflowError;
pub use phone::normalize_phone;
pub use traits::Transport;
pub use types::{
    fmt_ts, parse_ts, AutomationJob, FunnelStatus, Grade, JobStatus, JobType, Lead, LeadEvent,
    LockAcquire, MsgType, NewQueueItem, OptOutRecord, QueueItem, QueueStatus, Scenario,
    ScoreAction, ScoreHistoryEntry,
};
