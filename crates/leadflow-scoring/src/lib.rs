// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead score ledger engine.
//!
//! Every scoring action runs one read-modify-write cycle: load the ledger
//! (absent means score 0, empty history), apply the one-time inactivity
//! penalty if the lead has been quiet past the configured gap, add the
//! action's point delta, append history (bounded, oldest dropped first),
//! recompute the grade from the new total only, and persist everything as
//! one atomic versioned upsert. A CAS miss from a concurrent writer retries
//! the whole cycle once.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use leadflow_config::ScoringConfig;
use leadflow_core::types::{fmt_ts, parse_ts, FunnelStatus, Grade, Lead, ScoreHistoryEntry};
use leadflow_core::{normalize_phone, LeadflowError, ScoreAction};
use leadflow_storage::queries::{events, leads};
use leadflow_storage::Database;

/// Result of applying one scoring action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub score: i64,
    pub grade: Grade,
}

/// Compute the grade for a score. Pure function of the current total.
pub fn grade_for(score: i64, config: &ScoringConfig) -> Grade {
    if score >= config.grade_hot {
        Grade::Hot
    } else if score >= config.grade_warm {
        Grade::Warm
    } else {
        Grade::Cold
    }
}

/// The score ledger engine.
pub struct ScoreLedger {
    config: ScoringConfig,
}

impl ScoreLedger {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Apply a scoring action for a phone and persist the recomputed ledger.
    ///
    /// `now` is injected so tests control the clock; production callers pass
    /// `Utc::now()`.
    pub async fn apply_action(
        &self,
        db: &Database,
        phone: &str,
        action: ScoreAction,
        detail: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ScoreOutcome, LeadflowError> {
        let phone = normalize_phone(phone)?;
        let points = self.config.points_for(action).ok_or_else(|| {
            LeadflowError::Validation(format!("no point value configured for action {action}"))
        })?;

        // One retry on CAS miss, then surface the conflict.
        for attempt in 0..2 {
            let loaded = leads::get_lead(db, &phone).await?;
            let expected_version = loaded.as_ref().map(|l| l.version).unwrap_or(0);
            let mut lead = loaded.unwrap_or_else(|| fresh_lead(&phone));

            self.apply_decay(&mut lead, now);

            lead.score += points;
            lead.history.push(ScoreHistoryEntry {
                action: action.to_string(),
                delta: points,
                at: fmt_ts(now),
                detail: detail.map(|d| d.to_string()),
            });
            truncate_history(&mut lead.history, self.config.history_cap);

            lead.grade = grade_for(lead.score, &self.config);
            lead.last_action = Some(action.to_string());
            lead.last_action_at = Some(fmt_ts(now));

            if leads::write_ledger(db, &lead, expected_version).await? {
                events::append(
                    db,
                    &phone,
                    "SCORE_ACTION",
                    Some(&format!(
                        r#"{{"action":"{action}","delta":{points},"score":{}}}"#,
                        lead.score
                    )),
                )
                .await?;
                info!(
                    phone = %phone,
                    action = %action,
                    score = lead.score,
                    grade = %lead.grade,
                    "score applied"
                );
                return Ok(ScoreOutcome {
                    score: lead.score,
                    grade: lead.grade,
                });
            }
            debug!(phone = %phone, attempt, "ledger version conflict, retrying");
        }

        Err(LeadflowError::Storage {
            source: format!("concurrent ledger update for phone {phone} after retry").into(),
        })
    }

    /// One-time inactivity penalty, applied before the new action's delta.
    fn apply_decay(&self, lead: &mut Lead, now: DateTime<Utc>) {
        let Some(last_at) = lead.last_action_at.as_deref().and_then(parse_ts) else {
            return;
        };
        if now - last_at < Duration::days(self.config.inactivity_days) {
            return;
        }
        lead.score += self.config.inactivity_penalty;
        lead.history.push(ScoreHistoryEntry {
            action: format!("INACTIVE_{}DAYS", self.config.inactivity_days),
            delta: self.config.inactivity_penalty,
            at: fmt_ts(now),
            detail: None,
        });
    }
}

fn fresh_lead(phone: &str) -> Lead {
    Lead {
        phone: phone.to_string(),
        name: None,
        status: FunnelStatus::New,
        score: 0,
        grade: Grade::Cold,
        last_action: None,
        last_action_at: None,
        history: Vec::new(),
        version: 0,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

fn truncate_history(history: &mut Vec<ScoreHistoryEntry>, cap: usize) {
    if history.len() > cap {
        let excess = history.len() - cap;
        history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_storage::queries::leads::get_lead;

    async fn setup() -> (Database, ScoreLedger) {
        let db = Database::open_in_memory().await.unwrap();
        (db, ScoreLedger::new(ScoringConfig::default()))
    }

    fn t0() -> DateTime<Utc> {
        "2026-03-01T10:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn first_action_scores_from_zero() {
        let (db, ledger) = setup().await;
        let outcome = ledger
            .apply_action(&db, "010-1234-5678", ScoreAction::MeasureReq, None, t0())
            .await
            .unwrap();
        assert_eq!(outcome.score, 30);
        assert_eq!(outcome.grade, Grade::Warm);

        let lead = get_lead(&db, "01012345678").await.unwrap().unwrap();
        assert_eq!(lead.history.len(), 1);
        assert_eq!(lead.last_action.as_deref(), Some("MEASURE_REQ"));
    }

    #[tokio::test]
    async fn decay_applies_before_new_action_after_gap() {
        let (db, ledger) = setup().await;
        ledger
            .apply_action(&db, "01012345678", ScoreAction::MeasureReq, None, t0())
            .await
            .unwrap();

        // 8 days later: -10 decay first, then +20 RSVP.
        let later = t0() + Duration::days(8);
        let outcome = ledger
            .apply_action(&db, "01012345678", ScoreAction::Rsvp, None, later)
            .await
            .unwrap();
        assert_eq!(outcome.score, 40);
        assert_eq!(outcome.grade, Grade::Hot);

        let lead = get_lead(&db, "01012345678").await.unwrap().unwrap();
        let actions: Vec<&str> = lead.history.iter().map(|h| h.action.as_str()).collect();
        assert_eq!(actions, vec!["MEASURE_REQ", "INACTIVE_7DAYS", "RSVP"]);
        assert_eq!(lead.history[1].delta, -10);
    }

    #[tokio::test]
    async fn no_decay_within_gap() {
        let (db, ledger) = setup().await;
        ledger
            .apply_action(&db, "01012345678", ScoreAction::MeasureReq, None, t0())
            .await
            .unwrap();

        let outcome = ledger
            .apply_action(
                &db,
                "01012345678",
                ScoreAction::Rsvp,
                None,
                t0() + Duration::days(6),
            )
            .await
            .unwrap();
        assert_eq!(outcome.score, 50);
        assert_eq!(outcome.grade, Grade::Hot);

        let lead = get_lead(&db, "01012345678").await.unwrap().unwrap();
        assert_eq!(lead.history.len(), 2);
    }

    #[tokio::test]
    async fn decay_applies_only_once_per_gap() {
        let (db, ledger) = setup().await;
        ledger
            .apply_action(&db, "01012345678", ScoreAction::ProfileView, None, t0())
            .await
            .unwrap();

        // Two actions on the same late day: only the first sees the gap,
        // because last_action_at is refreshed by each write.
        let later = t0() + Duration::days(10);
        ledger
            .apply_action(&db, "01012345678", ScoreAction::ProfileView, None, later)
            .await
            .unwrap();
        let outcome = ledger
            .apply_action(
                &db,
                "01012345678",
                ScoreAction::ProfileView,
                None,
                later + Duration::minutes(5),
            )
            .await
            .unwrap();

        // 5 - 10 + 5 + 5
        assert_eq!(outcome.score, 5);
        let lead = get_lead(&db, "01012345678").await.unwrap().unwrap();
        let decays = lead
            .history
            .iter()
            .filter(|h| h.action == "INACTIVE_7DAYS")
            .count();
        assert_eq!(decays, 1);
    }

    #[tokio::test]
    async fn score_can_go_negative() {
        let (db, ledger) = setup().await;
        let mut config = ScoringConfig::default();
        config.action_points.insert("PROFILE_VIEW".into(), 2);
        let ledger2 = ScoreLedger::new(config);

        ledger
            .apply_action(&db, "01012345678", ScoreAction::ProfileView, None, t0())
            .await
            .unwrap();
        let outcome = ledger2
            .apply_action(
                &db,
                "01012345678",
                ScoreAction::ProfileView,
                None,
                t0() + Duration::days(30),
            )
            .await
            .unwrap();
        // 5 - 10 + 2
        assert_eq!(outcome.score, -3);
        assert_eq!(outcome.grade, Grade::Cold);
    }

    #[tokio::test]
    async fn history_is_capped_oldest_dropped_first() {
        let db = Database::open_in_memory().await.unwrap();
        let mut config = ScoringConfig::default();
        config.history_cap = 3;
        let ledger = ScoreLedger::new(config);

        for i in 0..5 {
            ledger
                .apply_action(
                    &db,
                    "01012345678",
                    ScoreAction::ProfileView,
                    Some(&format!("visit-{i}")),
                    t0() + Duration::minutes(i),
                )
                .await
                .unwrap();
        }

        let lead = get_lead(&db, "01012345678").await.unwrap().unwrap();
        assert_eq!(lead.history.len(), 3);
        assert_eq!(lead.history[0].detail.as_deref(), Some("visit-2"));
        assert_eq!(lead.history[2].detail.as_deref(), Some("visit-4"));
        // Score still reflects every action ever applied.
        assert_eq!(lead.score, 25);
    }

    #[tokio::test]
    async fn grade_never_drifts_from_score() {
        let (db, ledger) = setup().await;
        let outcome = ledger
            .apply_action(&db, "01012345678", ScoreAction::Rsvp, None, t0())
            .await
            .unwrap();
        assert_eq!(outcome.grade, grade_for(outcome.score, &ScoringConfig::default()));

        let lead = get_lead(&db, "01012345678").await.unwrap().unwrap();
        assert_eq!(lead.grade, grade_for(lead.score, &ScoringConfig::default()));
    }

    #[tokio::test]
    async fn unconfigured_action_is_a_validation_error() {
        let db = Database::open_in_memory().await.unwrap();
        let mut config = ScoringConfig::default();
        config.action_points.remove("RSVP");
        let ledger = ScoreLedger::new(config);

        let err = ledger
            .apply_action(&db, "01012345678", ScoreAction::Rsvp, None, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, LeadflowError::Validation(_)));
    }

    #[tokio::test]
    async fn invalid_phone_is_rejected_before_any_write() {
        let (db, ledger) = setup().await;
        let err = ledger
            .apply_action(&db, "no-digits", ScoreAction::Rsvp, None, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, LeadflowError::Validation(_)));
        assert!(get_lead(&db, "no-digits").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn audit_event_is_written_per_action() {
        let (db, ledger) = setup().await;
        ledger
            .apply_action(&db, "01012345678", ScoreAction::PdfDownload, None, t0())
            .await
            .unwrap();

        let events = leadflow_storage::queries::events::recent(&db, "01012345678", 10)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "SCORE_ACTION");
    }

    #[test]
    fn grade_thresholds_are_inclusive() {
        let config = ScoringConfig::default();
        assert_eq!(grade_for(40, &config), Grade::Hot);
        assert_eq!(grade_for(39, &config), Grade::Warm);
        assert_eq!(grade_for(20, &config), Grade::Warm);
        assert_eq!(grade_for(19, &config), Grade::Cold);
        assert_eq!(grade_for(-5, &config), Grade::Cold);
    }
}
