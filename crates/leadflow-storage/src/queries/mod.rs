// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table.

pub mod events;
pub mod jobs;
pub mod leads;
pub mod locks;
pub mod optout;
pub mod queue;
pub mod scenarios;
