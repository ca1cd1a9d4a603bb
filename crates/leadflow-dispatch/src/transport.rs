// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in transports.
//!
//! Real provider integrations live in their own crates; this module only
//! ships the no-op transport used for dry runs and local development.

use async_trait::async_trait;
use tracing::info;

use leadflow_core::types::{MsgType, QueueItem};
use leadflow_core::{LeadflowError, Transport};

/// Logs every message instead of delivering it. Accepts all channels.
#[derive(Debug, Default)]
pub struct NoopTransport;

#[async_trait]
impl Transport for NoopTransport {
    fn name(&self) -> &str {
        "noop"
    }

    fn supports(&self, _msg_type: MsgType) -> bool {
        true
    }

    async fn deliver(&self, item: &QueueItem) -> Result<(), LeadflowError> {
        info!(
            id = item.id,
            msg_type = %item.msg_type,
            body_len = item.body.len(),
            "noop delivery"
        );
        Ok(())
    }
}
