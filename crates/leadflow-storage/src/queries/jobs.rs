// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automation job operations.
//!
//! Lifecycle jobs are idempotent per (lead_phone, job_type) while QUEUED:
//! re-triggering the same transition before the job fires replaces `run_at`
//! and payload in place instead of creating a duplicate. The partial unique
//! index `idx_automation_jobs_queued` backs this guarantee at the store
//! level, turning cross-process races into a well-defined collision.
//!
//! Scenario jobs start in PENDING and historically repeat-fire; their
//! optional per-(phone, scenario) dedupe is decided by the caller.

use std::str::FromStr;

use rusqlite::params;

use leadflow_core::types::{AutomationJob, JobStatus, JobType};
use leadflow_core::LeadflowError;

use crate::database::Database;

/// Result of an idempotent lifecycle-job upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobUpsert {
    /// A new QUEUED row was created.
    Created(i64),
    /// An existing QUEUED row had its run_at/payload replaced.
    Replaced(i64),
}

impl JobUpsert {
    pub fn id(self) -> i64 {
        match self {
            JobUpsert::Created(id) | JobUpsert::Replaced(id) => id,
        }
    }
}

/// Result of a scenario job insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioJobInsert {
    Created(i64),
    /// Dedupe scope matched an existing pending job; nothing was written.
    Skipped,
}

fn map_row(row: &rusqlite::Row<'_>) -> Result<AutomationJob, rusqlite::Error> {
    let job_type: String = row.get(2)?;
    let status: String = row.get(3)?;
    Ok(AutomationJob {
        id: row.get(0)?,
        lead_phone: row.get(1)?,
        job_type: JobType::from_str(&job_type).unwrap_or(JobType::ScenarioMsg),
        status: JobStatus::from_str(&status).unwrap_or(JobStatus::Queued),
        run_at: row.get(4)?,
        payload: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const JOB_COLUMNS: &str =
    "id, lead_phone, job_type, status, run_at, payload, created_at, updated_at";

/// Idempotently schedule a lifecycle job for a lead.
///
/// If a QUEUED job of this type already exists for the phone, its `run_at`
/// and payload are replaced in place (the second trigger wins). Otherwise a
/// new QUEUED row is created.
///
/// Race-safe across concurrent schedulers, same shape as the lease lock:
/// attempt the INSERT first, and on a UNIQUE collision with the partial
/// index fall through to the in-place replace.
pub async fn upsert_queued(
    db: &Database,
    phone: &str,
    job_type: JobType,
    run_at: &str,
    payload: Option<&str>,
) -> Result<JobUpsert, LeadflowError> {
    let phone = phone.to_string();
    let job_type_s = job_type.to_string();
    let run_at = run_at.to_string();
    let payload = payload.map(|p| p.to_string());
    db.connection()
        .call(move |conn| -> Result<JobUpsert, rusqlite::Error> {
            loop {
                let inserted = conn.execute(
                    "INSERT INTO automation_jobs (lead_phone, job_type, status, run_at, payload)
                     VALUES (?1, ?2, 'QUEUED', ?3, ?4)",
                    params![phone, job_type_s, run_at, payload],
                );
                match inserted {
                    Ok(_) => return Ok(JobUpsert::Created(conn.last_insert_rowid())),
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == rusqlite::ErrorCode::ConstraintViolation => {}
                    Err(e) => return Err(e),
                }

                // A QUEUED row exists: replace run_at/payload in place. Zero
                // rows means a consumer moved it past QUEUED in between, so
                // insert again.
                let updated = conn.execute(
                    "UPDATE automation_jobs
                     SET run_at = ?3, payload = ?4,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE lead_phone = ?1 AND job_type = ?2 AND status = 'QUEUED'",
                    params![phone, job_type_s, run_at, payload],
                )?;
                if updated == 1 {
                    let id: i64 = conn.query_row(
                        "SELECT id FROM automation_jobs
                         WHERE lead_phone = ?1 AND job_type = ?2 AND status = 'QUEUED'",
                        params![phone, job_type_s],
                        |row| row.get(0),
                    )?;
                    return Ok(JobUpsert::Replaced(id));
                }
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a SCENARIO_MSG job in PENDING status.
///
/// With `dedupe` set, an existing PENDING job for the same (phone, scenario)
/// short-circuits to `Skipped`.
pub async fn insert_scenario_job(
    db: &Database,
    phone: &str,
    scenario_id: i64,
    run_at: &str,
    payload: &str,
    dedupe: bool,
) -> Result<ScenarioJobInsert, LeadflowError> {
    let phone = phone.to_string();
    let run_at = run_at.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| -> Result<ScenarioJobInsert, rusqlite::Error> {
            let tx = conn.transaction()?;

            if dedupe {
                let mut stmt = tx.prepare(
                    "SELECT 1 FROM automation_jobs
                     WHERE lead_phone = ?1 AND scenario_id = ?2 AND status = 'PENDING'
                     LIMIT 1",
                )?;
                let exists = stmt.exists(params![phone, scenario_id])?;
                if exists {
                    drop(stmt);
                    tx.commit()?;
                    return Ok(ScenarioJobInsert::Skipped);
                }
            }

            tx.execute(
                "INSERT INTO automation_jobs
                     (lead_phone, job_type, scenario_id, status, run_at, payload)
                 VALUES (?1, 'SCENARIO_MSG', ?2, 'PENDING', ?3, ?4)",
                params![phone, scenario_id, run_at, payload],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(ScenarioJobInsert::Created(id))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Jobs whose `run_at` has passed, in either schedulable status, oldest first.
pub async fn due(
    db: &Database,
    now: &str,
    limit: i64,
) -> Result<Vec<AutomationJob>, LeadflowError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM automation_jobs
                 WHERE status IN ('QUEUED', 'PENDING') AND run_at <= ?1
                 ORDER BY run_at ASC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![now, limit], map_row)?;
            let mut jobs = Vec::new();
            for row in rows {
                jobs.push(row?);
            }
            Ok(jobs)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Move a job to a consumer-side status (DONE, CANCELED, ...).
pub async fn set_status(db: &Database, id: i64, status: JobStatus) -> Result<(), LeadflowError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE automation_jobs
                 SET status = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![status, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a job by id.
pub async fn get(db: &Database, id: i64) -> Result<Option<AutomationJob>, LeadflowError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM automation_jobs WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], map_row) {
                Ok(job) => Ok(Some(job)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_row_and_second_run_at_wins() {
        let db = setup_db().await;

        let first = upsert_queued(
            &db,
            "01012345678",
            JobType::NewNudge,
            "2026-03-02T10:00:00.000Z",
            None,
        )
        .await
        .unwrap();
        assert!(matches!(first, JobUpsert::Created(_)));

        let second = upsert_queued(
            &db,
            "01012345678",
            JobType::NewNudge,
            "2026-03-03T09:00:00.000Z",
            Some(r#"{"note":"rescheduled"}"#),
        )
        .await
        .unwrap();
        assert!(matches!(second, JobUpsert::Replaced(_)));
        assert_eq!(first.id(), second.id());

        let job = get(&db, first.id()).await.unwrap().unwrap();
        assert_eq!(job.run_at, "2026-03-03T09:00:00.000Z");
        assert_eq!(job.payload.as_deref(), Some(r#"{"note":"rescheduled"}"#));
    }

    #[tokio::test]
    async fn insert_collision_from_another_writer_resolves_to_replace() {
        let db = setup_db().await;

        // Another scheduler process won the insert race for this slot.
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO automation_jobs (lead_phone, job_type, status, run_at)
                     VALUES ('01012345678', 'NEW_NUDGE', 'QUEUED', '2026-03-02T10:00:00.000Z')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let got = upsert_queued(
            &db,
            "01012345678",
            JobType::NewNudge,
            "2026-03-03T09:00:00.000Z",
            Some(r#"{"note":"lost the race"}"#),
        )
        .await
        .unwrap();
        assert!(matches!(got, JobUpsert::Replaced(_)));

        let job = get(&db, got.id()).await.unwrap().unwrap();
        assert_eq!(job.run_at, "2026-03-03T09:00:00.000Z");
        assert_eq!(job.payload.as_deref(), Some(r#"{"note":"lost the race"}"#));
    }

    #[tokio::test]
    async fn different_job_types_do_not_collide() {
        let db = setup_db().await;
        let a = upsert_queued(&db, "010", JobType::NewNudge, "2026-03-02T00:00:00.000Z", None)
            .await
            .unwrap();
        let b = upsert_queued(&db, "010", JobType::HappyCall, "2026-03-02T00:00:00.000Z", None)
            .await
            .unwrap();
        assert!(matches!(a, JobUpsert::Created(_)));
        assert!(matches!(b, JobUpsert::Created(_)));
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn done_job_does_not_block_a_new_queued_job() {
        let db = setup_db().await;
        let first = upsert_queued(&db, "010", JobType::NewNudge, "2026-03-02T00:00:00.000Z", None)
            .await
            .unwrap();
        set_status(&db, first.id(), JobStatus::Done).await.unwrap();

        // Uniqueness only holds while QUEUED.
        let second = upsert_queued(&db, "010", JobType::NewNudge, "2026-03-05T00:00:00.000Z", None)
            .await
            .unwrap();
        assert!(matches!(second, JobUpsert::Created(_)));
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test]
    async fn scenario_jobs_repeat_without_dedupe() {
        let db = setup_db().await;
        let a = insert_scenario_job(&db, "010", 7, "2026-03-01T11:00:00.000Z", "{}", false)
            .await
            .unwrap();
        let b = insert_scenario_job(&db, "010", 7, "2026-03-01T12:00:00.000Z", "{}", false)
            .await
            .unwrap();
        assert!(matches!(a, ScenarioJobInsert::Created(_)));
        assert!(matches!(b, ScenarioJobInsert::Created(_)));
    }

    #[tokio::test]
    async fn scenario_dedupe_skips_second_insert() {
        let db = setup_db().await;
        let a = insert_scenario_job(&db, "010", 7, "2026-03-01T11:00:00.000Z", "{}", true)
            .await
            .unwrap();
        let b = insert_scenario_job(&db, "010", 7, "2026-03-01T12:00:00.000Z", "{}", true)
            .await
            .unwrap();
        assert!(matches!(a, ScenarioJobInsert::Created(_)));
        assert_eq!(b, ScenarioJobInsert::Skipped);

        // A different scenario for the same phone is not deduped.
        let c = insert_scenario_job(&db, "010", 8, "2026-03-01T12:00:00.000Z", "{}", true)
            .await
            .unwrap();
        assert!(matches!(c, ScenarioJobInsert::Created(_)));
    }

    #[tokio::test]
    async fn due_returns_only_ripe_jobs_oldest_first() {
        let db = setup_db().await;
        upsert_queued(&db, "1", JobType::NewNudge, "2026-03-01T09:00:00.000Z", None)
            .await
            .unwrap();
        upsert_queued(&db, "2", JobType::NewNudge, "2026-03-01T08:00:00.000Z", None)
            .await
            .unwrap();
        upsert_queued(&db, "3", JobType::NewNudge, "2026-03-01T11:00:00.000Z", None)
            .await
            .unwrap();

        let jobs = due(&db, "2026-03-01T10:00:00.000Z", 10).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].lead_phone, "2");
        assert_eq!(jobs[1].lead_phone, "1");
    }
}
