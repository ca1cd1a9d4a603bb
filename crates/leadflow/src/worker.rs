// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `leadflow worker` command implementation.
//!
//! Runs dispatch cycles against the configured database. With `--once` a
//! single cycle is executed and its outcome printed; otherwise the worker
//! polls until Ctrl-C.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use leadflow_config::LeadflowConfig;
use leadflow_core::LeadflowError;
use leadflow_dispatch::{Dispatcher, NoopTransport};
use leadflow_storage::Database;

pub async fn run_worker(config: &LeadflowConfig, once: bool) -> Result<(), LeadflowError> {
    let db = Database::open(&config.storage.database_path).await?;
    let dispatcher = Dispatcher::new(config.dispatch.clone(), Arc::new(NoopTransport));

    if once {
        let outcome = dispatcher.run_cycle(&db, Utc::now()).await?;
        if outcome.ran {
            println!(
                "cycle: claimed={} sent={} failed={} suppressed={}",
                outcome.claimed, outcome.sent, outcome.failed, outcome.suppressed
            );
        } else {
            println!("cycle skipped: lease held by another worker");
        }
        db.close().await?;
        return Ok(());
    }

    info!(
        poll_interval_secs = config.dispatch.poll_interval_secs,
        "dispatch worker started"
    );
    let interval = std::time::Duration::from_secs(config.dispatch.poll_interval_secs);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            _ = async {
                if let Err(e) = dispatcher.run_cycle(&db, Utc::now()).await {
                    error!(error = %e, "dispatch cycle error");
                }
                tokio::time::sleep(interval).await;
            } => {}
        }
    }

    db.close().await?;
    Ok(())
}
