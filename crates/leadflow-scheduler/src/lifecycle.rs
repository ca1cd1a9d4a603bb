// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle automation scheduler.
//!
//! Maps a lead's funnel status transition to zero or more delayed job types.
//! Each mapped job is idempotently upserted per (phone, job_type): a second
//! trigger of the same transition before the job fires replaces `run_at` and
//! payload in place instead of duplicating the job. Statuses with no mapping
//! are no-ops. This is a pure write path; a separate consumer turns due jobs
//! into queue rows or direct sends.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use leadflow_config::SchedulerConfig;
use leadflow_core::types::fmt_ts;
use leadflow_core::{normalize_phone, FunnelStatus, JobType, Lead, LeadflowError};
use leadflow_storage::queries::jobs::{self, JobUpsert};
use leadflow_storage::queries::{events, leads};
use leadflow_storage::Database;

/// One job scheduled (or rescheduled) by a lifecycle transition.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub job_type: JobType,
    pub run_at: String,
    pub outcome: JobUpsert,
}

/// The lifecycle scheduler.
pub struct LifecycleScheduler {
    config: SchedulerConfig,
}

impl LifecycleScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// The fixed status-to-jobs mapping, with delays from config.
    fn jobs_for(&self, status: FunnelStatus) -> Vec<(JobType, Duration)> {
        match status {
            FunnelStatus::New => vec![(
                JobType::NewNudge,
                Duration::hours(self.config.new_nudge_hours),
            )],
            FunnelStatus::Estimated => vec![(
                JobType::EstimateFollowup,
                Duration::hours(self.config.estimate_followup_hours),
            )],
            FunnelStatus::Paid => vec![(JobType::PaymentThanks, Duration::zero())],
            FunnelStatus::Installed => vec![(
                JobType::HappyCall,
                Duration::hours(self.config.happy_call_hours),
            )],
            FunnelStatus::Measured
            | FunnelStatus::PayPending
            | FunnelStatus::Closed => Vec::new(),
        }
    }

    /// Schedule the jobs mapped to a funnel transition.
    pub async fn enqueue_for_lead(
        &self,
        db: &Database,
        phone: &str,
        new_status: FunnelStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledJob>, LeadflowError> {
        let phone = normalize_phone(phone)?;

        let mut scheduled = Vec::new();
        for (job_type, delay) in self.jobs_for(new_status) {
            let run_at = fmt_ts(now + delay);
            let payload = format!(r#"{{"status":"{new_status}"}}"#);
            let outcome =
                jobs::upsert_queued(db, &phone, job_type, &run_at, Some(&payload)).await?;
            info!(
                phone = %phone,
                job_type = %job_type,
                run_at = %run_at,
                replaced = matches!(outcome, JobUpsert::Replaced(_)),
                "automation job scheduled"
            );
            scheduled.push(ScheduledJob {
                job_type,
                run_at,
                outcome,
            });
        }
        Ok(scheduled)
    }

    /// Record a funnel transition end-to-end: upsert the lead row, append
    /// the audit event, and schedule the mapped jobs.
    pub async fn transition(
        &self,
        db: &Database,
        phone: &str,
        name: Option<&str>,
        new_status: FunnelStatus,
        now: DateTime<Utc>,
    ) -> Result<(Lead, Vec<ScheduledJob>), LeadflowError> {
        let phone = normalize_phone(phone)?;
        let lead = leads::upsert_status(db, &phone, name, new_status).await?;
        events::append(
            db,
            &phone,
            "STATUS_CHANGE",
            Some(&format!(r#"{{"to":"{new_status}"}}"#)),
        )
        .await?;
        let scheduled = self.enqueue_for_lead(db, &phone, new_status, now).await?;
        Ok((lead, scheduled))
    }
}
