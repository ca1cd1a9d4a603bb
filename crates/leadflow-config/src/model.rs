// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Leadflow dispatch engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Every threshold the engine consults (action
//! points, grade cutoffs, inactivity decay, lock TTLs, token age) lives
//! here rather than as a literal, so tests can control them deterministically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use leadflow_core::ScoreAction;

/// Top-level Leadflow configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LeadflowConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Lead score ledger settings.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Lifecycle scheduler and scenario engine settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Dispatch queue worker settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Opt-out and suppression settings.
    #[serde(default)]
    pub optout: OptOutConfig,
}

impl Default for LeadflowConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            storage: StorageConfig::default(),
            scoring: ScoringConfig::default(),
            scheduler: SchedulerConfig::default(),
            dispatch: DispatchConfig::default(),
            optout: OptOutConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "leadflow.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Lead score ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Point value per action, keyed by the action's SCREAMING_SNAKE name.
    #[serde(default = "default_action_points")]
    pub action_points: BTreeMap<String, i64>,

    /// Days of inactivity before the one-time decay penalty applies.
    #[serde(default = "default_inactivity_days")]
    pub inactivity_days: i64,

    /// Signed penalty applied once when the inactivity gap is exceeded.
    #[serde(default = "default_inactivity_penalty")]
    pub inactivity_penalty: i64,

    /// Score at or above which a lead grades HOT.
    #[serde(default = "default_grade_hot")]
    pub grade_hot: i64,

    /// Score at or above which a lead grades WARM.
    #[serde(default = "default_grade_warm")]
    pub grade_warm: i64,

    /// Maximum retained history entries per lead (oldest dropped first).
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            action_points: default_action_points(),
            inactivity_days: default_inactivity_days(),
            inactivity_penalty: default_inactivity_penalty(),
            grade_hot: default_grade_hot(),
            grade_warm: default_grade_warm(),
            history_cap: default_history_cap(),
        }
    }
}

impl ScoringConfig {
    /// Point value for an action. Unknown actions are a caller-side
    /// validation problem, so absence is surfaced as `None`, not zero.
    pub fn points_for(&self, action: ScoreAction) -> Option<i64> {
        self.action_points.get(&action.to_string()).copied()
    }
}

fn default_action_points() -> BTreeMap<String, i64> {
    BTreeMap::from([
        (ScoreAction::ProfileView.to_string(), 5),
        (ScoreAction::PdfDownload.to_string(), 10),
        (ScoreAction::Rsvp.to_string(), 20),
        (ScoreAction::ConsultReq.to_string(), 25),
        (ScoreAction::MeasureReq.to_string(), 30),
    ])
}

fn default_inactivity_days() -> i64 {
    7
}

fn default_inactivity_penalty() -> i64 {
    -10
}

fn default_grade_hot() -> i64 {
    40
}

fn default_grade_warm() -> i64 {
    20
}

fn default_history_cap() -> usize {
    50
}

/// Dedupe scope for the scenario trigger engine.
///
/// The lifecycle scheduler always dedupes per (phone, job_type); scenarios
/// historically repeat-fire, so their scope is configurable instead of
/// silently "fixed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioDedupe {
    /// Every matching trigger schedules a send (original behavior).
    #[default]
    None,
    /// At most one queued SCENARIO_MSG job per (phone, scenario).
    PerPhoneScenario,
}

/// Lifecycle scheduler and scenario engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Delay before the NEW-status nudge job becomes due, in hours.
    #[serde(default = "default_day_delay_hours")]
    pub new_nudge_hours: i64,

    /// Delay before the ESTIMATED follow-up job becomes due, in hours.
    #[serde(default = "default_day_delay_hours")]
    pub estimate_followup_hours: i64,

    /// Delay before the INSTALLED happy-call job becomes due, in hours.
    #[serde(default = "default_day_delay_hours")]
    pub happy_call_hours: i64,

    /// Dedupe scope for scenario-triggered jobs.
    #[serde(default)]
    pub scenario_dedupe: ScenarioDedupe,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            new_nudge_hours: default_day_delay_hours(),
            estimate_followup_hours: default_day_delay_hours(),
            happy_call_hours: default_day_delay_hours(),
            scenario_dedupe: ScenarioDedupe::default(),
        }
    }
}

fn default_day_delay_hours() -> i64 {
    24
}

/// Dispatch queue worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum due rows claimed per worker cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Lease key the worker acquires before processing.
    #[serde(default = "default_lock_key")]
    pub lock_key: String,

    /// Lease TTL in seconds. The lock self-expires; there is no release.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: i64,

    /// Minutes added to `next_retry_at` when a delivery attempt fails.
    #[serde(default = "default_retry_backoff_minutes")]
    pub retry_backoff_minutes: i64,

    /// Seconds between worker cycles when running as a long-lived process.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            lock_key: default_lock_key(),
            lock_ttl_secs: default_lock_ttl_secs(),
            retry_backoff_minutes: default_retry_backoff_minutes(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}

fn default_lock_key() -> String {
    "dispatch_worker".to_string()
}

fn default_lock_ttl_secs() -> i64 {
    60
}

fn default_retry_backoff_minutes() -> i64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    30
}

/// Opt-out and suppression configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OptOutConfig {
    /// Server secret for HMAC-signed self-service opt-out links.
    /// Must be set before opt-out links can be issued or verified.
    #[serde(default)]
    pub secret: String,

    /// Maximum accepted age (seconds) of a signed opt-out token, in either
    /// direction of clock skew.
    #[serde(default = "default_token_max_age_secs")]
    pub token_max_age_secs: i64,

    /// Inbound keywords that trigger immediate suppression.
    #[serde(default = "default_stop_keywords")]
    pub stop_keywords: Vec<String>,
}

impl Default for OptOutConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_max_age_secs: default_token_max_age_secs(),
            stop_keywords: default_stop_keywords(),
        }
    }
}

fn default_token_max_age_secs() -> i64 {
    3600
}

fn default_stop_keywords() -> Vec<String> {
    vec![
        "STOP".to_string(),
        "UNSUBSCRIBE".to_string(),
        "수신거부".to_string(),
    ]
}
