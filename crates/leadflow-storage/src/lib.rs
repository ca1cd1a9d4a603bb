// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Leadflow dispatch engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed query modules for leads,
//! audit events, automation jobs, scenarios, the dispatch queue, worker
//! leases, and the suppression list.
//!
//! All cross-invocation guarantees of the subsystem are store-level
//! constraints defined here: the partial unique index on QUEUED automation
//! jobs, the UNIQUE dedupe_key on the dispatch queue, and the worker_locks
//! lease row.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
