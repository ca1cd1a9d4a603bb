// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams toward external collaborators.
//!
//! The dispatch worker decides *what* to send, *when*, and *once*; the
//! physical delivery (SMS/chat provider) lives behind [`Transport`] and is
//! out of scope here.

use async_trait::async_trait;

use crate::error::LeadflowError;
use crate::types::{MsgType, QueueItem};

/// Delivery transport for outbound messages.
///
/// Implementations wrap a concrete provider (SMS gateway, chat API). A
/// returned error is recorded on the queue row as a delivery failure; it
/// must never represent "recipient suppressed" -- suppression is checked
/// before the transport is ever called.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short provider name for logs ("sms-gw", "kakao", "noop").
    fn name(&self) -> &str;

    /// Whether this transport can carry the given channel.
    fn supports(&self, msg_type: MsgType) -> bool;

    /// Attempt delivery of one claimed queue row.
    async fn deliver(&self, item: &QueueItem) -> Result<(), LeadflowError>;
}
