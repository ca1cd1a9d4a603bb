// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scenario rule CRUD and trigger-time reads.
//!
//! Scenarios are operator-edited standing rules. At trigger time the engine
//! only reads them, except for the `triggered_count` bump.

use rusqlite::params;

use leadflow_core::types::Scenario;
use leadflow_core::LeadflowError;

use crate::database::Database;

/// Caller-facing shape for creating a scenario.
#[derive(Debug, Clone)]
pub struct NewScenario {
    pub name: String,
    pub trigger_type: String,
    pub wait_minutes: i64,
    pub message_template: String,
    pub is_active: bool,
}

fn map_row(row: &rusqlite::Row<'_>) -> Result<Scenario, rusqlite::Error> {
    Ok(Scenario {
        id: row.get(0)?,
        name: row.get(1)?,
        trigger_type: row.get(2)?,
        wait_minutes: row.get(3)?,
        message_template: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        triggered_count: row.get(6)?,
        completed_count: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const SCENARIO_COLUMNS: &str = "id, name, trigger_type, wait_minutes, message_template,
                                is_active, triggered_count, completed_count, created_at";

/// Create a scenario rule. Returns the new id.
pub async fn create(db: &Database, scenario: &NewScenario) -> Result<i64, LeadflowError> {
    let s = scenario.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO scenarios (name, trigger_type, wait_minutes, message_template, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![s.name, s.trigger_type, s.wait_minutes, s.message_template, s.is_active as i64],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a scenario by id.
pub async fn get(db: &Database, id: i64) -> Result<Option<Scenario>, LeadflowError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCENARIO_COLUMNS} FROM scenarios WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], map_row) {
                Ok(s) => Ok(Some(s)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all scenarios, newest first.
pub async fn list(db: &Database) -> Result<Vec<Scenario>, LeadflowError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCENARIO_COLUMNS} FROM scenarios ORDER BY id DESC"
            ))?;
            let rows = stmt.query_map([], map_row)?;
            let mut scenarios = Vec::new();
            for row in rows {
                scenarios.push(row?);
            }
            Ok(scenarios)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active scenarios matching a trigger type. The trigger-time read path.
pub async fn active_by_trigger(
    db: &Database,
    trigger_type: &str,
) -> Result<Vec<Scenario>, LeadflowError> {
    let trigger_type = trigger_type.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCENARIO_COLUMNS} FROM scenarios
                 WHERE trigger_type = ?1 AND is_active = 1
                 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![trigger_type], map_row)?;
            let mut scenarios = Vec::new();
            for row in rows {
                scenarios.push(row?);
            }
            Ok(scenarios)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Enable or disable a scenario.
pub async fn set_active(db: &Database, id: i64, active: bool) -> Result<(), LeadflowError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scenarios SET is_active = ?1 WHERE id = ?2",
                params![active as i64, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Bump the triggered counter; called once per trigger match.
pub async fn increment_triggered(db: &Database, id: i64) -> Result<(), LeadflowError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scenarios SET triggered_count = triggered_count + 1 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Bump the completed counter; called by the job runner after delivery.
pub async fn increment_completed(db: &Database, id: i64) -> Result<(), LeadflowError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scenarios SET completed_count = completed_count + 1 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
