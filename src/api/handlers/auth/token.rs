//! Session token minting and structural validation.
//!
//! A token is `<account id>::<64-hex secret>`. The id rides along in plain
//! text so the authenticator can address the account without a lookup; the
//! secret is the only unguessable part and carries 256 bits of OS randomness.
//! `::` cannot appear in a valid email address or in hex, so splitting is
//! unambiguous.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use super::error::AuthError;
use super::utils::valid_email;

pub(crate) const TOKEN_DELIMITER: &str = "::";
const SECRET_BYTES: usize = 32;
const SECRET_HEX_LENGTH: usize = 64;

/// Mint a fresh token bound to an account id.
///
/// Unlike OTP generation there is no weak fallback here: token unguessability
/// is the only authentication barrier, so a failed OS random source fails the
/// request.
pub(super) fn issue(account_id: &str) -> Result<String, AuthError> {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(AuthError::RandomnessUnavailable)?;

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let secret = hex::encode(hasher.finalize());

    Ok(format!("{account_id}{TOKEN_DELIMITER}{secret}"))
}

/// Split a presented token into `(account id, secret)` after validating its
/// structural form. Returns `None` for anything that is not
/// `<email>::<64-hex>`.
pub(super) fn split(token: &str) -> Option<(String, String)> {
    let normalized = token.trim().to_lowercase();
    let parts: Vec<&str> = normalized.split(TOKEN_DELIMITER).collect();
    let [id, secret] = parts.as_slice() else {
        return None;
    };

    if !valid_email(id) || !valid_secret(secret) {
        return None;
    }

    Some(((*id).to_string(), (*secret).to_string()))
}

fn valid_secret(secret: &str) -> bool {
    secret.len() == SECRET_HEX_LENGTH
        && secret
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_splits_back_to_its_id() {
        let token = issue("a@b.com").expect("token");
        let (id, secret) = split(&token).expect("split");
        assert_eq!(id, "a@b.com");
        assert_eq!(secret.len(), SECRET_HEX_LENGTH);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn issued_tokens_are_unique() {
        let first = issue("a@b.com").expect("token");
        let second = issue("a@b.com").expect("token");
        assert_ne!(first, second);
    }

    #[test]
    fn split_normalizes_case() {
        let token = issue("a@b.com").expect("token");
        let upper = token.to_uppercase();
        let (id, _secret) = split(&upper).expect("split");
        assert_eq!(id, "a@b.com");
    }

    #[test]
    fn split_rejects_structural_garbage() {
        assert!(split("").is_none());
        assert!(split("no-delimiter").is_none());
        assert!(split("a@b.com").is_none());
        // Too many parts.
        let token = issue("a@b.com").expect("token");
        assert!(split(&format!("{token}::extra")).is_none());
        // Bad id.
        assert!(split(&format!("not-an-email::{}", "a".repeat(64))).is_none());
        // Bad secret: wrong length and wrong alphabet.
        assert!(split(&format!("a@b.com::{}", "a".repeat(63))).is_none());
        assert!(split(&format!("a@b.com::{}", "g".repeat(64))).is_none());
    }
}
