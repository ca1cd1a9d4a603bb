// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch worker cycle.
//!
//! One cycle: acquire the lease, claim a batch of due READY rows, and for
//! each row either suppress it (opted-out recipient), deliver it through
//! the transport, or record the delivery failure. Per-row errors are
//! recorded on the row and never abort the rest of the batch. If the lease
//! is held elsewhere the cycle is a no-op, not an error.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use leadflow_config::DispatchConfig;
use leadflow_core::types::fmt_ts;
use leadflow_core::{LeadflowError, QueueItem, Transport};
use leadflow_storage::queries::{locks, optout, queue};
use leadflow_storage::Database;

/// What one worker cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// The lease was acquired and the batch was processed.
    pub ran: bool,
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
    pub suppressed: usize,
}

/// The dispatch queue worker.
pub struct Dispatcher {
    config: DispatchConfig,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Run one send cycle at the given instant.
    ///
    /// Suppression is checked per row at send time, after the claim: a
    /// recipient who opted out while the row sat READY is still caught.
    pub async fn run_cycle(
        &self,
        db: &Database,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome, LeadflowError> {
        let lease = locks::acquire(db, &self.config.lock_key, self.config.lock_ttl_secs, now)
            .await?;
        if !lease.acquired {
            debug!(
                lock_key = %self.config.lock_key,
                locked_until = lease.locked_until.as_deref().unwrap_or(""),
                "lease held elsewhere, skipping cycle"
            );
            return Ok(CycleOutcome::default());
        }

        let now_s = fmt_ts(now);
        let claimed = queue::claim_due(db, &now_s, self.config.batch_size as i64).await?;
        let mut outcome = CycleOutcome {
            ran: true,
            claimed: claimed.len(),
            ..CycleOutcome::default()
        };

        for item in &claimed {
            match self.process_one(db, item, now).await? {
                RowDisposition::Sent => outcome.sent += 1,
                RowDisposition::Failed => outcome.failed += 1,
                RowDisposition::Suppressed => outcome.suppressed += 1,
            }
        }

        if outcome.claimed > 0 {
            info!(
                claimed = outcome.claimed,
                sent = outcome.sent,
                failed = outcome.failed,
                suppressed = outcome.suppressed,
                "dispatch cycle complete"
            );
        }
        Ok(outcome)
    }

    async fn process_one(
        &self,
        db: &Database,
        item: &QueueItem,
        now: DateTime<Utc>,
    ) -> Result<RowDisposition, LeadflowError> {
        if optout::is_suppressed(db, &item.to_phone).await? {
            queue::mark_suppressed(db, item.id).await?;
            info!(id = item.id, "recipient suppressed, send dropped");
            return Ok(RowDisposition::Suppressed);
        }

        if !self.transport.supports(item.msg_type) {
            let reason = format!(
                "transport {} does not carry {}",
                self.transport.name(),
                item.msg_type
            );
            self.record_failure(db, item, &reason, now).await?;
            return Ok(RowDisposition::Failed);
        }

        match self.transport.deliver(item).await {
            Ok(()) => {
                queue::mark_sent(db, item.id, &fmt_ts(now)).await?;
                debug!(id = item.id, transport = self.transport.name(), "sent");
                Ok(RowDisposition::Sent)
            }
            Err(e) => {
                self.record_failure(db, item, &e.to_string(), now).await?;
                Ok(RowDisposition::Failed)
            }
        }
    }

    async fn record_failure(
        &self,
        db: &Database,
        item: &QueueItem,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LeadflowError> {
        let next_retry = fmt_ts(now + Duration::minutes(self.config.retry_backoff_minutes));
        queue::mark_failed(db, item.id, reason, &next_retry, &fmt_ts(now)).await?;
        warn!(id = item.id, reason, "delivery failed");
        Ok(())
    }

}

enum RowDisposition {
    Sent,
    Failed,
    Suppressed,
}
