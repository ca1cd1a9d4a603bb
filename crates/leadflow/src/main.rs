// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leadflow - lead lifecycle message dispatch engine.
//!
//! Binary entry point. Loads and validates configuration, then dispatches
//! to the requested subcommand.

use clap::{Parser, Subcommand};

use leadflow_core::{FunnelStatus, ScoreAction};

mod admin;
mod lead;
mod worker;

/// Leadflow - lead lifecycle message dispatch engine.
#[derive(Parser, Debug)]
#[command(name = "leadflow", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the dispatch worker.
    Worker {
        /// Run a single cycle and exit instead of polling forever.
        #[arg(long)]
        once: bool,
    },
    /// Record a scoring action for a lead.
    Score {
        phone: String,
        action: ScoreAction,
        /// Free-form detail stored with the history entry.
        #[arg(long)]
        detail: Option<String>,
    },
    /// Move a lead to a funnel status and schedule its automation jobs.
    Transition {
        phone: String,
        status: FunnelStatus,
        /// Lead display name, stored on first sight.
        #[arg(long)]
        name: Option<String>,
    },
    /// Fire scenario rules matching a trigger signal for a phone.
    Trigger {
        phone: String,
        trigger_type: String,
    },
    /// Reset a queue row to READY.
    Retry { id: i64 },
    /// Force a queue row to FAILED with a reason.
    ForceFail {
        id: i64,
        #[arg(long, default_value = "operator")]
        reason: String,
    },
    /// Show queue row counts per status.
    Stats {
        /// Output structured JSON for scripting.
        #[arg(long)]
        json: bool,
    },
    /// Print a signed self-service opt-out link token for a phone.
    OptoutLink { phone: String },
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("leadflow={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match leadflow_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            eprint!("{}", leadflow_config::render_errors(&errors));
            std::process::exit(1);
        }
    };
    init_tracing(&config.log_level);

    let result = match cli.command {
        Commands::Worker { once } => worker::run_worker(&config, once).await,
        Commands::Score {
            phone,
            action,
            detail,
        } => lead::run_score(&config, &phone, action, detail.as_deref()).await,
        Commands::Transition {
            phone,
            status,
            name,
        } => lead::run_transition(&config, &phone, status, name.as_deref()).await,
        Commands::Trigger {
            phone,
            trigger_type,
        } => lead::run_trigger(&config, &phone, &trigger_type).await,
        Commands::Retry { id } => admin::run_retry(&config, id).await,
        Commands::ForceFail { id, reason } => admin::run_force_fail(&config, id, &reason).await,
        Commands::Stats { json } => admin::run_stats(&config, json).await,
        Commands::OptoutLink { phone } => admin::run_optout_link(&config, &phone).await,
    };

    if let Err(e) = result {
        eprintln!("leadflow: {e}");
        std::process::exit(1);
    }
}
