//! Error taxonomy for the OTP/token lifecycle.
//!
//! Client errors carry their human-readable message onto the wire; store,
//! delivery, and randomness failures are logged with detail server-side and
//! collapse to a generic message so internals never leak.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use super::utils::human_duration;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed email or OTP; nothing was looked up or mutated.
    #[error("{0}")]
    InvalidInput(String),

    /// No account, or no challenge outstanding for the account.
    #[error("Please request an OTP first.")]
    NoChallenge,

    /// The outstanding challenge passed its expiry time.
    #[error("Your OTP has expired.")]
    Expired,

    /// Wrong code with attempts remaining.
    #[error("The OTP you provided is incorrect.")]
    IncorrectOtp,

    /// Wrong code and the attempt cap was just reached.
    #[error("Too many failed attempts. Please request a new OTP in an hour.")]
    LockedOut,

    /// Issuance refused while the cooldown is running.
    #[error("Please wait {} before trying again.", human_duration(.0))]
    Cooldown(Duration),

    /// Verification refused while the cooldown is running.
    #[error("Please request a new OTP in {}.", human_duration(.0))]
    LockActive(Duration),

    /// Cooldown has passed but only issuance may reset the challenge.
    #[error("Please request a new OTP.")]
    NewChallengeRequired,

    /// Authorization header is not `<email>::<64-hex>`.
    #[error("Invalid token format.")]
    MalformedToken,

    /// Token mismatch, unknown account, or lost rotation race.
    #[error("Authorization failed.")]
    Unauthorized,

    /// The secure random source failed while minting a token.
    #[error("Failed to generate token.")]
    RandomnessUnavailable(#[source] rand::Error),

    /// Store I/O failure or deadline expiry.
    #[error("Database error.")]
    Store(#[source] anyhow::Error),

    /// The account mutation committed but the OTP email did not go out.
    #[error("Failed to send OTP email.")]
    Delivery(#[source] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_)
            | Self::NoChallenge
            | Self::Expired
            | Self::IncorrectOtp
            | Self::LockedOut
            | Self::Cooldown(_)
            | Self::LockActive(_)
            | Self::NewChallengeRequired => StatusCode::BAD_REQUEST,
            Self::MalformedToken | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RandomnessUnavailable(_) | Self::Store(_) | Self::Delivery(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            Self::RandomnessUnavailable(err) => error!("Failed to generate token: {err}"),
            Self::Store(err) => error!("Store error: {err:#}"),
            Self::Delivery(err) => error!("Failed to send OTP email: {err:#}"),
            _ => {}
        }

        let body = Json(json!({ "message": self.to_string() }));
        (self.status(), body).into_response()
    }
}
