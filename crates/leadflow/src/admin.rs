// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator commands: `retry`, `force-fail`, `stats`, and `optout-link`.

use std::collections::BTreeMap;

use chrono::Utc;

use leadflow_config::LeadflowConfig;
use leadflow_core::LeadflowError;
use leadflow_optout::OptOutService;
use leadflow_storage::queries::queue;
use leadflow_storage::Database;

pub async fn run_retry(config: &LeadflowConfig, id: i64) -> Result<(), LeadflowError> {
    let db = Database::open(&config.storage.database_path).await?;
    if queue::retry(&db, id).await? {
        println!("queue row {id} reset to READY");
    } else {
        eprintln!("queue row {id} not found");
    }
    db.close().await
}

pub async fn run_force_fail(
    config: &LeadflowConfig,
    id: i64,
    reason: &str,
) -> Result<(), LeadflowError> {
    let db = Database::open(&config.storage.database_path).await?;
    if queue::force_fail(&db, id, reason).await? {
        println!("queue row {id} forced to FAILED ({reason})");
    } else {
        eprintln!("queue row {id} not found");
    }
    db.close().await
}

pub async fn run_stats(config: &LeadflowConfig, json: bool) -> Result<(), LeadflowError> {
    let db = Database::open(&config.storage.database_path).await?;
    let counts = queue::counts_by_status(&db).await?;

    if json {
        let map: BTreeMap<_, _> = counts.into_iter().collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
        );
    } else if counts.is_empty() {
        println!("queue is empty");
    } else {
        println!("  queue status");
        println!("  {}", "-".repeat(25));
        for (status, count) in &counts {
            println!("    {status:<12} {count}");
        }
    }

    db.close().await
}

pub async fn run_optout_link(config: &LeadflowConfig, phone: &str) -> Result<(), LeadflowError> {
    let service = OptOutService::new(config.optout.clone());
    let token = service.issue_token(phone, Utc::now())?;
    println!(
        "phone={}&ts={}&sig={}",
        token.phone, token.issued_at, token.signature
    );
    Ok(())
}
