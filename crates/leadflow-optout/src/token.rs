// SPDX-FileCopyrightText: 2026 Leadflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed self-service opt-out tokens.
//!
//! A token covers `phone.timestamp` with HMAC-SHA256 under the server
//! secret and is carried as lowercase hex. Verification is constant-time
//! via the `Mac` comparison and additionally bounds the timestamp's age in
//! both directions to cap replay and clock-skew windows.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use leadflow_core::LeadflowError;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, phone: &str, issued_at: i64) -> Result<HmacSha256, LeadflowError> {
    if secret.is_empty() {
        return Err(LeadflowError::Config(
            "optout.secret must be set to issue or verify opt-out tokens".to_string(),
        ));
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| LeadflowError::Internal(format!("hmac key setup: {e}")))?;
    mac.update(phone.as_bytes());
    mac.update(b".");
    mac.update(issued_at.to_string().as_bytes());
    Ok(mac)
}

/// Sign an opt-out token for a phone at an issue instant.
pub fn sign(secret: &str, phone: &str, issued_at: DateTime<Utc>) -> Result<String, LeadflowError> {
    let mac = mac_for(secret, phone, issued_at.timestamp())?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a presented token. `Ok(())` only when the signature matches and
/// `issued_at` is within `max_age_secs` of `now` in either direction.
pub fn verify(
    secret: &str,
    phone: &str,
    issued_at: i64,
    signature: &str,
    now: DateTime<Utc>,
    max_age_secs: i64,
) -> Result<(), LeadflowError> {
    let age = (now.timestamp() - issued_at).abs();
    if age > max_age_secs {
        return Err(LeadflowError::Validation(
            "opt-out token expired".to_string(),
        ));
    }

    let raw = hex::decode(signature)
        .map_err(|_| LeadflowError::Validation("malformed opt-out signature".to_string()))?;
    mac_for(secret, phone, issued_at)?
        .verify_slice(&raw)
        .map_err(|_| LeadflowError::Validation("invalid opt-out signature".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &str = "test-secret";

    fn t0() -> DateTime<Utc> {
        "2026-03-01T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn signed_token_verifies() {
        let sig = sign(SECRET, "01012345678", t0()).unwrap();
        verify(SECRET, "01012345678", t0().timestamp(), &sig, t0(), 3600).unwrap();
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let mut sig = sign(SECRET, "01012345678", t0()).unwrap();
        let last = sig.pop().unwrap();
        sig.push(if last == '0' { '1' } else { '0' });

        let err = verify(SECRET, "01012345678", t0().timestamp(), &sig, t0(), 3600).unwrap_err();
        assert!(matches!(err, LeadflowError::Validation(_)));
    }

    #[test]
    fn token_for_another_phone_is_rejected() {
        let sig = sign(SECRET, "01012345678", t0()).unwrap();
        let err = verify(SECRET, "01099998888", t0().timestamp(), &sig, t0(), 3600).unwrap_err();
        assert!(matches!(err, LeadflowError::Validation(_)));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let sig = sign(SECRET, "01012345678", t0()).unwrap();
        let err = verify("other", "01012345678", t0().timestamp(), &sig, t0(), 3600).unwrap_err();
        assert!(matches!(err, LeadflowError::Validation(_)));
    }

    #[test]
    fn expired_token_is_rejected_before_mac_check() {
        let sig = sign(SECRET, "01012345678", t0()).unwrap();
        let later = t0() + Duration::seconds(3601);
        let err = verify(SECRET, "01012345678", t0().timestamp(), &sig, later, 3600).unwrap_err();
        assert!(matches!(err, LeadflowError::Validation(_)));
    }

    #[test]
    fn future_dated_token_beyond_skew_is_rejected() {
        let future = t0() + Duration::seconds(4000);
        let sig = sign(SECRET, "01012345678", future).unwrap();
        let err = verify(SECRET, "01012345678", future.timestamp(), &sig, t0(), 3600).unwrap_err();
        assert!(matches!(err, LeadflowError::Validation(_)));
    }

    #[test]
    fn age_boundary_is_inclusive() {
        let sig = sign(SECRET, "01012345678", t0()).unwrap();
        let at_limit = t0() + Duration::seconds(3600);
        verify(SECRET, "01012345678", t0().timestamp(), &sig, at_limit, 3600).unwrap();
    }

    #[test]
    fn empty_secret_cannot_sign_or_verify() {
        assert!(matches!(
            sign("", "01012345678", t0()).unwrap_err(),
            LeadflowError::Config(_)
        ));
        assert!(matches!(
            verify("", "01012345678", t0().timestamp(), "00", t0(), 3600).unwrap_err(),
            LeadflowError::Config(_)
        ));
    }

    #[test]
    fn malformed_hex_is_rejected() {
        let err =
            verify(SECRET, "01012345678", t0().timestamp(), "zz-not-hex", t0(), 3600).unwrap_err();
        assert!(matches!(err, LeadflowError::Validation(_)));
    }
}
