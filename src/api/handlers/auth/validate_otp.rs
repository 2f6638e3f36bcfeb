//! OTP verification endpoint: a correct code is exchanged for a bearer token.

use axum::{extract::Extension, http::StatusCode, Json};
use std::sync::Arc;
use tracing::instrument;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{find_account, install_token, record_failed_attempt};
use super::token;
use super::types::{AccountResponse, ErrorMessage, ValidateOtp};
use super::utils::{normalize_email, now_millis, remaining_millis, valid_email, valid_otp};

/// Verify a submitted code and mint the session token.
///
/// Attempt accounting is per-account: four wrong codes invalidate the
/// challenge and start the one-hour cooldown. Verification never resets
/// challenge state on the locked path, even once the cooldown has passed;
/// only issuance does that.
#[utoipa::path(
    post,
    path = "/validate-otp",
    request_body = ValidateOtp,
    responses(
        (status = 200, description = "Token issued", body = AccountResponse),
        (status = 400, description = "Invalid input, expired, incorrect, or locked", body = ErrorMessage),
        (status = 500, description = "Store failure", body = ErrorMessage)
    ),
    tag = "auth"
)]
#[instrument(skip(pool, state, payload))]
pub async fn validate_otp(
    pool: Extension<sqlx::PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ValidateOtp>>,
) -> Result<(StatusCode, Json<AccountResponse>), AuthError> {
    let request = payload
        .map(|Json(payload)| payload)
        .ok_or_else(|| AuthError::InvalidInput("Invalid request format.".to_string()))?;

    let email = normalize_email(&request.email_address);
    let submitted = request.otp.trim();
    if !valid_email(&email) || !valid_otp(submitted) {
        return Err(AuthError::InvalidInput(
            "Invalid email or OTP format.".to_string(),
        ));
    }

    let config = state.config();
    let deadline = config.store_deadline();

    let Some(account) = find_account(&pool, deadline, &email)
        .await
        .map_err(AuthError::Store)?
    else {
        return Err(AuthError::NoChallenge);
    };

    let now = now_millis();

    // The locked branch comes before the no-challenge check: reaching the
    // attempt cap clears the stored code, and a locked account must hear
    // about its cooldown, not be told to request a new challenge.
    if account.otp_attempt_count >= config.max_otp_attempts() {
        let remaining = remaining_millis(account.cooldown_time, now);
        if remaining.is_zero() {
            return Err(AuthError::NewChallengeRequired);
        }
        return Err(AuthError::LockActive(remaining));
    }

    let Some(stored) = account.otp.as_deref() else {
        return Err(AuthError::NoChallenge);
    };

    if now > account.otp_expiry_time.unwrap_or(0) {
        return Err(AuthError::Expired);
    }

    if stored.eq_ignore_ascii_case(submitted) {
        let minted = token::issue(&email)?;
        let updated = install_token(&pool, deadline, &email, &minted)
            .await
            .map_err(AuthError::Store)?
            .ok_or_else(|| {
                AuthError::Store(anyhow::anyhow!("account {email} vanished during token install"))
            })?;

        return Ok((StatusCode::OK, Json(AccountResponse::project(updated, minted))));
    }

    // Wrong code: count it, and on the final allowed attempt invalidate the
    // challenge and start the cooldown in the same statement.
    let attempts_after = account.otp_attempt_count + 1;
    if attempts_after >= config.max_otp_attempts() {
        let lock_until = now + config.cooldown_millis();
        record_failed_attempt(&pool, deadline, &email, Some(lock_until))
            .await
            .map_err(AuthError::Store)?;
        Err(AuthError::LockedOut)
    } else {
        record_failed_attempt(&pool, deadline, &email, None)
            .await
            .map_err(AuthError::Store)?;
        Err(AuthError::IncorrectOtp)
    }
}
