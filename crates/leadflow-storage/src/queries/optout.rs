// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Suppression list reads and writes.
//!
//! Once a phone is present here, no send path may reach it again. Removal
//! is deliberately not implemented.

use rusqlite::params;
use tracing::info;

use leadflow_core::types::OptOutRecord;
use leadflow_core::LeadflowError;

use crate::database::Database;

/// Add a phone to the suppression list. Idempotent: re-suppressing an
/// already-suppressed phone keeps the original record and reason.
pub async fn suppress(db: &Database, phone: &str, reason: &str) -> Result<(), LeadflowError> {
    let phone = phone.to_string();
    let reason = reason.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "INSERT OR IGNORE INTO optout_records (phone, reason) VALUES (?1, ?2)",
                params![phone, reason],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if changed == 1 {
        info!("phone added to suppression list");
    }
    Ok(())
}

/// Whether a phone is suppressed. Consulted before every send attempt.
pub async fn is_suppressed(db: &Database, phone: &str) -> Result<bool, LeadflowError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare("SELECT 1 FROM optout_records WHERE phone = ?1")?;
            stmt.exists(params![phone])
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch the suppression record for a phone, if any.
pub async fn get(db: &Database, phone: &str) -> Result<Option<OptOutRecord>, LeadflowError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT phone, reason, created_at FROM optout_records WHERE phone = ?1",
            )?;
            let result = stmt.query_row(params![phone], |row| {
                Ok(OptOutRecord {
                    phone: row.get(0)?,
                    reason: row.get(1)?,
                    created_at: row.get(2)?,
                })
            });
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}
