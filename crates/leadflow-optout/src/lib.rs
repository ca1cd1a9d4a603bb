// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opt-out handling for the Leadflow engine.
//!
//! Two entry paths add a phone to the suppression list: a signed
//! self-service token (from a link embedded in outbound messages) and an
//! inbound stop keyword. Both are one-way; removal from the list is
//! deliberately unsupported.

pub mod token;

use chrono::{DateTime, Utc};
use tracing::info;

use leadflow_config::OptOutConfig;
use leadflow_core::{normalize_phone, LeadflowError, OptOutRecord};
use leadflow_storage::queries::optout;
use leadflow_storage::Database;

/// A signed self-service opt-out token, as embedded in an outbound link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptOutToken {
    pub phone: String,
    pub issued_at: i64,
    pub signature: String,
}

/// Opt-out entry points, bound to the configured secret and keywords.
pub struct OptOutService {
    config: OptOutConfig,
}

impl OptOutService {
    pub fn new(config: OptOutConfig) -> Self {
        Self { config }
    }

    /// Issue a token for embedding in an outbound opt-out link.
    pub fn issue_token(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<OptOutToken, LeadflowError> {
        let phone = normalize_phone(phone)?;
        let signature = token::sign(&self.config.secret, &phone, now)?;
        Ok(OptOutToken {
            phone,
            issued_at: now.timestamp(),
            signature,
        })
    }

    /// Self-service path: verify a presented token and suppress the phone.
    /// Idempotent; a second visit to the same link is still a success.
    pub async fn opt_out_via_token(
        &self,
        db: &Database,
        phone: &str,
        issued_at: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LeadflowError> {
        let phone = normalize_phone(phone)?;
        token::verify(
            &self.config.secret,
            &phone,
            issued_at,
            signature,
            now,
            self.config.token_max_age_secs,
        )?;
        optout::suppress(db, &phone, "self_service").await?;
        info!("self-service opt-out accepted");
        Ok(())
    }

    /// Whether an inbound message body asks to stop receiving messages.
    ///
    /// Keyword match is exact after trimming, case-insensitive for the
    /// ASCII keywords. Substring matching would false-positive on ordinary
    /// replies, so the whole body must be the keyword.
    pub fn is_stop_message(&self, body: &str) -> bool {
        let trimmed = body.trim();
        self.config
            .stop_keywords
            .iter()
            .any(|k| trimmed.eq_ignore_ascii_case(k))
    }

    /// Inbound path: suppress the sender when the body is a stop keyword.
    /// Returns whether a suppression was triggered.
    pub async fn handle_inbound(
        &self,
        db: &Database,
        phone: &str,
        body: &str,
    ) -> Result<bool, LeadflowError> {
        if !self.is_stop_message(body) {
            return Ok(false);
        }
        let phone = normalize_phone(phone)?;
        optout::suppress(db, &phone, "keyword").await?;
        info!("stop keyword opt-out accepted");
        Ok(true)
    }

    /// The suppression record for a phone, if any. Operator surface.
    pub async fn status(
        &self,
        db: &Database,
        phone: &str,
    ) -> Result<Option<OptOutRecord>, LeadflowError> {
        let phone = normalize_phone(phone)?;
        optout::get(db, &phone).await
    }
}
