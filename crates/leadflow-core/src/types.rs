// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Leadflow workspace.
//!
//! All status-like enums derive strum's `Display`/`EnumString` with
//! SCREAMING_SNAKE_CASE serialization so they round-trip through the TEXT
//! columns they are stored in. Timestamps are ISO 8601 UTC strings; the
//! [`fmt_ts`]/[`parse_ts`] helpers are the single source of the format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Timestamp format used everywhere a chrono time is written to the store.
pub const TS_FMT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a UTC timestamp in the canonical store format.
pub fn fmt_ts(at: DateTime<Utc>) -> String {
    at.format(TS_FMT).to_string()
}

/// Parse a timestamp previously written with [`fmt_ts`].
///
/// Also accepts SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ','now')` output,
/// which is the same shape.
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Position of a lead in the sales funnel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunnelStatus {
    New,
    Measured,
    Estimated,
    PayPending,
    Paid,
    Installed,
    Closed,
}

/// Derived lead temperature, recomputed from score on every write.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    Hot,
    Warm,
    Cold,
}

/// Scoring actions a lead can perform. Point values live in config, not here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreAction {
    ProfileView,
    PdfDownload,
    Rsvp,
    ConsultReq,
    MeasureReq,
}

/// Automation job types produced by lifecycle transitions and scenarios.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    NewNudge,
    EstimateFollowup,
    PaymentThanks,
    HappyCall,
    ScenarioMsg,
}

/// Automation job lifecycle. QUEUED rows are the only ones covered by the
/// (phone, job_type) uniqueness guarantee; the rest belong to the consumer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Pending,
    Done,
    Canceled,
}

/// Dispatch queue row states.
///
/// READY -> SENDING -> SENT | FAILED is the worker path. SUPPRESSED is the
/// terminal state for rows whose recipient opted out before the attempt;
/// it never carries error fields. Operator `retry` moves any state back to
/// READY; operator `force_fail` moves any state to FAILED.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Ready,
    Sending,
    Sent,
    Failed,
    Suppressed,
}

/// Outbound message channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MsgType {
    Sms,
    Lms,
    Kakao,
}

/// One entry in a lead's bounded scoring history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistoryEntry {
    /// Action name (`ScoreAction` display form, or `INACTIVE_7DAYS`).
    pub action: String,
    /// Signed point delta applied.
    pub delta: i64,
    /// When the entry was appended.
    pub at: String,
    /// Free-form detail from the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A lead row. Phone is the normalized identity and join key everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub phone: String,
    pub name: Option<String>,
    pub status: FunnelStatus,
    pub score: i64,
    pub grade: Grade,
    pub last_action: Option<String>,
    pub last_action_at: Option<String>,
    pub history: Vec<ScoreHistoryEntry>,
    /// Optimistic concurrency token for the score ledger upsert.
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Immutable audit record for anything that happened to a lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadEvent {
    pub id: i64,
    pub phone: String,
    pub event_type: String,
    pub payload: Option<String>,
    pub created_at: String,
}

/// A delayed automation job scheduled for a lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationJob {
    pub id: i64,
    pub lead_phone: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub run_at: String,
    pub payload: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A standing operator-configured if-trigger-then-message rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: i64,
    pub name: String,
    pub trigger_type: String,
    pub wait_minutes: i64,
    pub message_template: String,
    pub is_active: bool,
    pub triggered_count: i64,
    pub completed_count: i64,
    pub created_at: String,
}

/// A row in the outbound dispatch queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    pub dedupe_key: String,
    pub campaign_key: String,
    pub trigger_key: String,
    pub to_phone: String,
    pub to_name: Option<String>,
    pub msg_type: MsgType,
    pub body: String,
    pub status: QueueStatus,
    pub scheduled_at: String,
    pub sending_at: Option<String>,
    pub sent_at: Option<String>,
    pub next_retry_at: Option<String>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub last_error_at: Option<String>,
    pub fail_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Producer-side shape for inserting into the dispatch queue.
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub dedupe_key: String,
    pub campaign_key: String,
    pub trigger_key: String,
    pub to_phone: String,
    pub to_name: Option<String>,
    pub msg_type: MsgType,
    pub body: String,
    pub scheduled_at: String,
}

/// Outcome of a lease acquisition attempt. Not-acquired is a normal,
/// frequent result meaning "another instance is already working".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockAcquire {
    pub acquired: bool,
    pub locked_until: Option<String>,
}

/// A suppression entry. Once present, the phone never receives another send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptOutRecord {
    pub phone: String,
    pub reason: String,
    pub created_at: String,
}
