// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TTL lease lock for periodic workers.
//!
//! A lock is free if no row exists for its key, or the row's `locked_until`
//! is at or before the caller's `now`. There is no release path: the lock
//! self-expires. "Not acquired" means another instance is already working
//! and the caller skips this cycle; it is never an error to retry on.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use tracing::debug;

use leadflow_core::types::{fmt_ts, LockAcquire};
use leadflow_core::LeadflowError;

use crate::database::Database;

/// Attempt to acquire the named lease until `now + ttl_secs`.
///
/// Race-safe across concurrent callers: first an INSERT (wins only if no
/// row exists), then on UNIQUE collision a conditional UPDATE that succeeds
/// only while the current lease has expired. Zero rows updated means a
/// concurrent caller renewed the lease first.
pub async fn acquire(
    db: &Database,
    lock_key: &str,
    ttl_secs: i64,
    now: DateTime<Utc>,
) -> Result<LockAcquire, LeadflowError> {
    if lock_key.trim().is_empty() {
        return Err(LeadflowError::Validation(
            "lock_key must not be empty".to_string(),
        ));
    }
    let lock_key = lock_key.to_string();
    let until = fmt_ts(now + Duration::seconds(ttl_secs));
    let now_s = fmt_ts(now);

    let outcome = db
        .connection()
        .call(move |conn| -> Result<LockAcquire, rusqlite::Error> {
            let inserted = conn.execute(
                "INSERT INTO worker_locks (lock_key, locked_until) VALUES (?1, ?2)",
                params![lock_key, until],
            );
            match inserted {
                Ok(_) => {
                    return Ok(LockAcquire {
                        acquired: true,
                        locked_until: Some(until),
                    });
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation => {}
                Err(e) => return Err(e),
            }

            // Row exists: take over only if the current lease has expired.
            let updated = conn.execute(
                "UPDATE worker_locks SET locked_until = ?2
                 WHERE lock_key = ?1 AND locked_until <= ?3",
                params![lock_key, until, now_s],
            )?;
            if updated == 1 {
                return Ok(LockAcquire {
                    acquired: true,
                    locked_until: Some(until),
                });
            }

            let holder: String = conn.query_row(
                "SELECT locked_until FROM worker_locks WHERE lock_key = ?1",
                params![lock_key],
                |row| row.get(0),
            )?;
            Ok(LockAcquire {
                acquired: false,
                locked_until: Some(holder),
            })
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    debug!(acquired = outcome.acquired, "lease acquisition attempt");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn t0() -> DateTime<Utc> {
        "2026-03-01T10:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn first_acquire_wins() {
        let db = setup_db().await;
        let result = acquire(&db, "daily_report", 60, t0()).await.unwrap();
        assert!(result.acquired);
        assert_eq!(
            result.locked_until.as_deref(),
            Some("2026-03-01T10:01:00.000Z")
        );
    }

    #[tokio::test]
    async fn second_acquire_within_ttl_loses() {
        let db = setup_db().await;
        let first = acquire(&db, "daily_report", 60, t0()).await.unwrap();
        assert!(first.acquired);

        let second = acquire(&db, "daily_report", 60, t0()).await.unwrap();
        assert!(!second.acquired);
        // Loser sees the winner's expiry.
        assert_eq!(second.locked_until, first.locked_until);
    }

    #[tokio::test]
    async fn acquire_after_expiry_succeeds() {
        let db = setup_db().await;
        assert!(acquire(&db, "daily_report", 60, t0()).await.unwrap().acquired);

        let after = t0() + Duration::seconds(61);
        let third = acquire(&db, "daily_report", 60, after).await.unwrap();
        assert!(third.acquired);
        assert_eq!(
            third.locked_until.as_deref(),
            Some("2026-03-01T10:02:01.000Z")
        );
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let db = setup_db().await;
        assert!(acquire(&db, "daily_report", 60, t0()).await.unwrap().acquired);
        assert!(acquire(&db, "weekly_digest", 60, t0()).await.unwrap().acquired);
    }

    #[tokio::test]
    async fn expiry_boundary_is_inclusive() {
        // locked_until <= now counts as free.
        let db = setup_db().await;
        assert!(acquire(&db, "job", 60, t0()).await.unwrap().acquired);
        let at_expiry = t0() + Duration::seconds(60);
        assert!(acquire(&db, "job", 60, at_expiry).await.unwrap().acquired);
    }

    #[tokio::test]
    async fn empty_lock_key_is_rejected() {
        let db = setup_db().await;
        let err = acquire(&db, "  ", 60, t0()).await.unwrap_err();
        assert!(matches!(err, LeadflowError::Validation(_)));
    }
}
