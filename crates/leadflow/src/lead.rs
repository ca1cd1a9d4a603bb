// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead-facing commands: `score`, `transition`, and `trigger`.
//!
//! These are the write paths normally driven by webhook plumbing; exposing
//! them as subcommands keeps the engine operable from cron jobs and shell
//! scripts without any HTTP surface.

use chrono::Utc;

use leadflow_config::LeadflowConfig;
use leadflow_core::{FunnelStatus, LeadflowError, ScoreAction};
use leadflow_scheduler::{LifecycleScheduler, ScenarioEngine};
use leadflow_scoring::ScoreLedger;
use leadflow_storage::queries::jobs::ScenarioJobInsert;
use leadflow_storage::Database;

pub async fn run_score(
    config: &LeadflowConfig,
    phone: &str,
    action: ScoreAction,
    detail: Option<&str>,
) -> Result<(), LeadflowError> {
    let db = Database::open(&config.storage.database_path).await?;
    let ledger = ScoreLedger::new(config.scoring.clone());

    let outcome = ledger.apply_action(&db, phone, action, detail, Utc::now()).await?;
    println!("score: {} grade: {}", outcome.score, outcome.grade);

    db.close().await
}

pub async fn run_transition(
    config: &LeadflowConfig,
    phone: &str,
    status: FunnelStatus,
    name: Option<&str>,
) -> Result<(), LeadflowError> {
    let db = Database::open(&config.storage.database_path).await?;
    let scheduler = LifecycleScheduler::new(config.scheduler.clone());

    let (lead, scheduled) = scheduler.transition(&db, phone, name, status, Utc::now()).await?;
    println!("lead {} now {}", lead.phone, lead.status);
    for job in &scheduled {
        println!("  scheduled {} at {}", job.job_type, job.run_at);
    }
    if scheduled.is_empty() {
        println!("  no automation jobs for this status");
    }

    db.close().await
}

pub async fn run_trigger(
    config: &LeadflowConfig,
    phone: &str,
    trigger_type: &str,
) -> Result<(), LeadflowError> {
    let db = Database::open(&config.storage.database_path).await?;
    let engine = ScenarioEngine::new(config.scheduler.clone());

    let triggered = engine.trigger(&db, phone, trigger_type, Utc::now()).await?;
    if triggered.is_empty() {
        println!("no active scenarios match {trigger_type}");
    }
    for t in &triggered {
        match t.outcome {
            ScenarioJobInsert::Created(job_id) => {
                println!("scenario {} scheduled job {} at {}", t.scenario_id, job_id, t.run_at);
            }
            ScenarioJobInsert::Skipped => {
                println!("scenario {} already pending for this phone, skipped", t.scenario_id);
            }
        }
    }

    db.close().await
}
