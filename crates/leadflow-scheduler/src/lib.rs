// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automation scheduling for the Leadflow dispatch engine.
//!
//! Two producers feed the automation job table: the [`lifecycle`] scheduler
//! reacts to funnel status transitions with idempotent per-(phone, job_type)
//! upserts, and the [`scenario`] engine reacts to external trigger signals
//! with operator-configured standing rules.

pub mod lifecycle;
pub mod scenario;

pub use lifecycle::{LifecycleScheduler, ScheduledJob};
pub use scenario::{ScenarioEngine, TriggeredScenario};
