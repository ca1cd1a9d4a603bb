// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scenario trigger engine.
//!
//! Matches an external trigger signal against active scenario rules and
//! schedules one delayed SCENARIO_MSG job per match. The `triggered`
//! counter increments on every match. Whether repeated triggers of the same
//! (phone, scenario) pile up is governed by the configured dedupe scope:
//! the original behavior is repeat-fire, unlike the lifecycle scheduler's
//! per-(phone, job_type) uniqueness.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use leadflow_config::{ScenarioDedupe, SchedulerConfig};
use leadflow_core::types::fmt_ts;
use leadflow_core::{normalize_phone, LeadflowError, Scenario};
use leadflow_storage::queries::jobs::{self, ScenarioJobInsert};
use leadflow_storage::queries::{leads, scenarios};
use leadflow_storage::Database;

/// One scenario match and the job it produced (or skipped).
#[derive(Debug, Clone)]
pub struct TriggeredScenario {
    pub scenario_id: i64,
    pub run_at: String,
    pub outcome: ScenarioJobInsert,
}

/// Payload carried by a SCENARIO_MSG job.
#[derive(Debug, Serialize)]
struct ScenarioPayload<'a> {
    scenario_id: i64,
    message: &'a str,
}

/// The scenario trigger engine.
pub struct ScenarioEngine {
    config: SchedulerConfig,
}

impl ScenarioEngine {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// React to an external trigger signal for a phone.
    pub async fn trigger(
        &self,
        db: &Database,
        phone: &str,
        trigger_type: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<TriggeredScenario>, LeadflowError> {
        let phone = normalize_phone(phone)?;
        if trigger_type.trim().is_empty() {
            return Err(LeadflowError::Validation(
                "trigger_type must not be empty".to_string(),
            ));
        }

        let matches = scenarios::active_by_trigger(db, trigger_type).await?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        // Template rendering uses the lead's display name when known.
        let display_name = leads::get_lead(db, &phone)
            .await?
            .and_then(|l| l.name)
            .unwrap_or_else(|| phone.clone());

        let dedupe = self.config.scenario_dedupe == ScenarioDedupe::PerPhoneScenario;
        let mut triggered = Vec::with_capacity(matches.len());
        for scenario in matches {
            let run_at = fmt_ts(now + Duration::minutes(scenario.wait_minutes));
            let message = render_template(&scenario, &display_name);
            let payload = serde_json::to_string(&ScenarioPayload {
                scenario_id: scenario.id,
                message: &message,
            })
            .map_err(|e| LeadflowError::Storage {
                source: Box::new(e),
            })?;

            let outcome =
                jobs::insert_scenario_job(db, &phone, scenario.id, &run_at, &payload, dedupe)
                    .await?;
            scenarios::increment_triggered(db, scenario.id).await?;
            info!(
                phone = %phone,
                scenario_id = scenario.id,
                run_at = %run_at,
                skipped = outcome == ScenarioJobInsert::Skipped,
                "scenario triggered"
            );
            triggered.push(TriggeredScenario {
                scenario_id: scenario.id,
                run_at,
                outcome,
            });
        }
        Ok(triggered)
    }
}

fn render_template(scenario: &Scenario, display_name: &str) -> String {
    scenario.message_template.replace("{name}", display_name)
}
