// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead row operations: funnel status upserts and the versioned score
//! ledger write.
//!
//! Leads are created on their first funnel event and never hard-deleted.
//! The ledger write is a compare-and-swap on the `version` column; a CAS
//! miss means a concurrent writer got there first and the caller must
//! re-run its read-modify-write cycle.

use std::str::FromStr;

use rusqlite::params;

use leadflow_core::types::{FunnelStatus, Grade, Lead, ScoreHistoryEntry};
use leadflow_core::LeadflowError;

use crate::database::Database;

fn map_row(row: &rusqlite::Row<'_>) -> Result<Lead, rusqlite::Error> {
    let status: String = row.get(2)?;
    let grade: String = row.get(4)?;
    let history_json: String = row.get(7)?;
    let history: Vec<ScoreHistoryEntry> =
        serde_json::from_str(&history_json).unwrap_or_default();
    Ok(Lead {
        phone: row.get(0)?,
        name: row.get(1)?,
        status: FunnelStatus::from_str(&status).unwrap_or(FunnelStatus::New),
        score: row.get(3)?,
        grade: Grade::from_str(&grade).unwrap_or(Grade::Cold),
        last_action: row.get(5)?,
        last_action_at: row.get(6)?,
        history,
        version: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const LEAD_COLUMNS: &str = "phone, name, status, score, grade, last_action, last_action_at,
                            history, version, created_at, updated_at";

/// Fetch a lead by normalized phone.
pub async fn get_lead(db: &Database, phone: &str) -> Result<Option<Lead>, LeadflowError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEAD_COLUMNS} FROM leads WHERE phone = ?1"
            ))?;
            let result = stmt.query_row(params![phone], map_row);
            match result {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Create the lead on its first funnel event, or move an existing lead to a
/// new funnel status. Returns the stored row.
pub async fn upsert_status(
    db: &Database,
    phone: &str,
    name: Option<&str>,
    status: FunnelStatus,
) -> Result<Lead, LeadflowError> {
    let phone = phone.to_string();
    let name = name.map(|n| n.to_string());
    let status_s = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO leads (phone, name, status)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(phone) DO UPDATE SET
                     status = excluded.status,
                     name = COALESCE(excluded.name, leads.name),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![phone, name, status_s],
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEAD_COLUMNS} FROM leads WHERE phone = ?1"
            ))?;
            stmt.query_row(params![phone], map_row)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist a recomputed score ledger as one atomic write.
///
/// CAS semantics: `expected_version` is the version the caller loaded (0 for
/// a lead that did not exist yet). Returns `false` without writing anything
/// if another writer bumped the version in between.
pub async fn write_ledger(
    db: &Database,
    lead: &Lead,
    expected_version: i64,
) -> Result<bool, LeadflowError> {
    let phone = lead.phone.clone();
    let name = lead.name.clone();
    let status = lead.status.to_string();
    let score = lead.score;
    let grade = lead.grade.to_string();
    let last_action = lead.last_action.clone();
    let last_action_at = lead.last_action_at.clone();
    let history = serde_json::to_string(&lead.history).map_err(|e| LeadflowError::Storage {
        source: Box::new(e),
    })?;

    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            // The inserted version is expected+1; on conflict the update only
            // applies while the stored version still equals expected.
            let changed = conn.execute(
                "INSERT INTO leads
                     (phone, name, status, score, grade, last_action, last_action_at,
                      history, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9 + 1)
                 ON CONFLICT(phone) DO UPDATE SET
                     score = excluded.score,
                     grade = excluded.grade,
                     last_action = excluded.last_action,
                     last_action_at = excluded.last_action_at,
                     history = excluded.history,
                     version = excluded.version,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE leads.version = ?9",
                params![
                    phone,
                    name,
                    status,
                    score,
                    grade,
                    last_action,
                    last_action_at,
                    history,
                    expected_version,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
