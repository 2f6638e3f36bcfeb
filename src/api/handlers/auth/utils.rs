//! Small helpers for input validation, OTP generation, and time handling.

use rand::{rngs::OsRng, rngs::StdRng, RngCore, SeedableRng};
use regex::Regex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Challenge codes are six characters drawn from this alphabet.
pub(crate) const OTP_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub(crate) const OTP_LENGTH: usize = 6;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Submitted codes must be exactly six alphanumeric characters.
pub(crate) fn valid_otp(otp: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9]{6}$").is_ok_and(|regex| regex.is_match(otp))
}

/// Generate a six-character challenge code.
///
/// Codes come from the OS random source. If that source fails, fall back to a
/// time-seeded generator rather than failing the request; OTPs are emailed
/// secrets with a short expiry and attempt cap, so a degraded source is an
/// acceptable (logged) fallback, unlike session tokens.
pub(crate) fn generate_otp() -> String {
    let mut bytes = [0u8; OTP_LENGTH];

    if let Err(err) = OsRng.try_fill_bytes(&mut bytes) {
        warn!("OS random source unavailable, using time-seeded OTP generation: {err}");
        let seed = u64::try_from(now_millis()).unwrap_or(0);
        StdRng::seed_from_u64(seed).fill_bytes(&mut bytes);
    }

    bytes
        .iter()
        .map(|byte| OTP_ALPHABET[usize::from(*byte) % OTP_ALPHABET.len()] as char)
        .collect()
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

/// Remaining wait until a millisecond timestamp, zero when already past.
pub(crate) fn remaining_millis(until: Option<i64>, now: i64) -> Duration {
    let remaining = until.unwrap_or(0).saturating_sub(now);
    Duration::from_millis(u64::try_from(remaining).unwrap_or(0))
}

/// Render a wait duration in its largest nonzero unit.
pub(crate) fn human_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs} seconds")
    } else if secs < 3600 {
        format!("{} minutes", secs / 60)
    } else {
        format!("{} hours", secs / 3600)
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn valid_otp_accepts_six_alphanumerics() {
        assert!(valid_otp("A1B2C3"));
        assert!(valid_otp("abc123"));
        assert!(valid_otp("000000"));
    }

    #[test]
    fn valid_otp_rejects_wrong_shape() {
        assert!(!valid_otp("A1B2C"));
        assert!(!valid_otp("A1B2C3D"));
        assert!(!valid_otp("A1B2C!"));
        assert!(!valid_otp(""));
    }

    #[test]
    fn generate_otp_uses_the_documented_alphabet() {
        for _ in 0..32 {
            let otp = generate_otp();
            assert_eq!(otp.len(), OTP_LENGTH);
            assert!(otp.bytes().all(|byte| OTP_ALPHABET.contains(&byte)));
        }
    }

    #[test]
    fn now_millis_is_recent() {
        // Anything after 2020-01-01 passes; guards against unit slips.
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn remaining_millis_clamps_to_zero() {
        assert_eq!(remaining_millis(Some(1_000), 2_000), Duration::ZERO);
        assert_eq!(remaining_millis(None, 2_000), Duration::ZERO);
        assert_eq!(
            remaining_millis(Some(5_000), 2_000),
            Duration::from_millis(3_000)
        );
    }

    #[test]
    fn human_duration_picks_largest_unit() {
        assert_eq!(human_duration(&Duration::from_secs(42)), "42 seconds");
        assert_eq!(human_duration(&Duration::from_secs(90)), "1 minutes");
        assert_eq!(human_duration(&Duration::from_secs(3 * 60)), "3 minutes");
        assert_eq!(human_duration(&Duration::from_secs(2 * 3600)), "2 hours");
        assert_eq!(human_duration(&Duration::from_secs(3599)), "59 minutes");
    }
}
