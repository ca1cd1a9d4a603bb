// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch queue worker for the Leadflow engine.
//!
//! The worker is the only component that moves queue rows past READY. Each
//! cycle runs under a store-backed TTL lease so overlapping worker instances
//! stay single-writer without any external coordinator.

pub mod transport;
pub mod worker;

pub use transport::NoopTransport;
pub use worker::{CycleOutcome, Dispatcher};
