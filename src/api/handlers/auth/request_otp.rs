//! OTP issuance endpoint.

use axum::{extract::Extension, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::api::email::OtpMessage;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{find_account, insert_account, refresh_challenge, reset_challenge,
    InsertOutcome};
use super::types::{ErrorMessage, RequestOtp};
use super::utils::{generate_otp, normalize_email, now_millis, remaining_millis, valid_email};

/// Issue (or re-issue) a challenge for an email address.
///
/// The account is created lazily on the first request. While attempts remain,
/// a re-request only swaps the code and extends the expiry, so a user mashing
/// "resend" does not reset their own lockout accounting. Once the attempt cap
/// is reached, a new challenge is only issued after the cooldown has passed.
#[utoipa::path(
    get,
    path = "/request-otp",
    request_body = RequestOtp,
    responses(
        (status = 200, description = "OTP issued and emailed"),
        (status = 400, description = "Invalid email or cooldown pending", body = ErrorMessage),
        (status = 500, description = "Store or delivery failure", body = ErrorMessage)
    ),
    tag = "auth"
)]
#[instrument(skip(pool, state, payload))]
pub async fn request_otp(
    pool: Extension<sqlx::PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RequestOtp>>,
) -> Result<StatusCode, AuthError> {
    let request = payload
        .map(|Json(payload)| payload)
        .ok_or_else(|| AuthError::InvalidInput("Invalid request body.".to_string()))?;

    let email = normalize_email(&request.email_address);
    if !valid_email(&email) {
        return Err(AuthError::InvalidInput(
            "Invalid email address format.".to_string(),
        ));
    }

    let config = state.config();
    let deadline = config.store_deadline();
    let otp = generate_otp();
    let now = now_millis();
    let otp_expiry_time = now + config.otp_ttl_millis();

    let account = find_account(&pool, deadline, &email)
        .await
        .map_err(AuthError::Store)?;

    match account {
        None => {
            debug!("creating account for first challenge");
            match insert_account(&pool, deadline, &email, &otp, otp_expiry_time)
                .await
                .map_err(AuthError::Store)?
            {
                InsertOutcome::Created => {}
                InsertOutcome::Conflict => {
                    // Lost the creation race; the competing request owns the
                    // challenge now and ours must not clobber blind.
                    return Err(AuthError::Store(anyhow::anyhow!(
                        "account creation conflict for {email}"
                    )));
                }
            }
        }
        Some(account) if account.otp_attempt_count < config.max_otp_attempts() => {
            refresh_challenge(&pool, deadline, &email, &otp, otp_expiry_time)
                .await
                .map_err(AuthError::Store)?;
        }
        Some(account) => {
            let remaining = remaining_millis(account.cooldown_time, now);
            if remaining.is_zero() {
                reset_challenge(&pool, deadline, &email, &otp, otp_expiry_time)
                    .await
                    .map_err(AuthError::Store)?;
            } else {
                return Err(AuthError::Cooldown(remaining));
            }
        }
    }

    // The challenge is committed at this point; a failed send leaves it
    // in place and the client recovers by requesting again.
    let message = OtpMessage {
        to_email: email,
        otp,
        valid_minutes: config.otp_ttl_minutes(),
    };
    state
        .mailer()
        .send(&message)
        .await
        .map_err(AuthError::Delivery)?;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogMailer;
    use crate::api::handlers::auth::state::AuthConfig;
    use axum::response::IntoResponse;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Extension<Arc<AuthState>> {
        Extension(Arc::new(AuthState::new(
            AuthConfig::new(),
            Arc::new(LogMailer),
        )))
    }

    fn lazy_pool() -> Extension<sqlx::PgPool> {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool");
        Extension(pool)
    }

    #[tokio::test]
    async fn request_otp_missing_payload() {
        let response = request_otp(lazy_pool(), auth_state(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn request_otp_invalid_email() {
        let response = request_otp(
            lazy_pool(),
            auth_state(),
            Some(Json(RequestOtp {
                email_address: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn request_otp_blank_email() {
        let response = request_otp(
            lazy_pool(),
            auth_state(),
            Some(Json(RequestOtp {
                email_address: "   ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
