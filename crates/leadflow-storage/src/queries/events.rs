// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only lead event audit trail.

use rusqlite::params;

use leadflow_core::types::LeadEvent;
use leadflow_core::LeadflowError;

use crate::database::Database;

/// Append an audit event. Returns the new event id.
pub async fn append(
    db: &Database,
    phone: &str,
    event_type: &str,
    payload: Option<&str>,
) -> Result<i64, LeadflowError> {
    let phone = phone.to_string();
    let event_type = event_type.to_string();
    let payload = payload.map(|p| p.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO lead_events (phone, event_type, payload) VALUES (?1, ?2, ?3)",
                params![phone, event_type, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent events for a phone, newest first.
pub async fn recent(
    db: &Database,
    phone: &str,
    limit: i64,
) -> Result<Vec<LeadEvent>, LeadflowError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, phone, event_type, payload, created_at
                 FROM lead_events WHERE phone = ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![phone, limit], |row| {
                Ok(LeadEvent {
                    id: row.get(0)?,
                    phone: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
