// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone number normalization.
//!
//! The normalized phone (digits only) is the join key across every table in
//! the subsystem. Every entry point normalizes before any lookup, insert, or
//! comparison; nothing downstream ever sees a raw phone string.

use crate::error::LeadflowError;

/// Normalize a phone number to its canonical digits-only form.
///
/// Strips every non-digit character. An input with no digits at all is a
/// validation error, never an empty-string identity.
pub fn normalize_phone(raw: &str) -> Result<String, LeadflowError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(LeadflowError::Validation(format!(
            "phone number contains no digits: {raw:?}"
        )));
    }
    Ok(digits)
}
