//! Wire types and the persistence/response split for accounts.
//!
//! [`Account`] is the persistence entity: it carries challenge and token
//! internals and is only ever built from a database row. [`AccountResponse`]
//! is the wire projection: the account id, the freshly issued token, and the
//! inert profile payload. The mapping between the two is explicit so challenge
//! state is never serialized by accident.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct RequestOtp {
    pub email_address: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct ValidateOtp {
    pub email_address: String,
    pub otp: String,
}

/// Error envelope for non-2xx responses.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorMessage {
    pub message: String,
}

/// Inert profile payload carried alongside the account record.
///
/// The state machine never reads these fields; they round-trip between the
/// store and the response projection unchanged.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, Default)]
pub struct Profile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub interests: Vec<String>,
    pub langs: Vec<String>,
    pub insta_handler: Option<String>,
    pub fb_handler: Option<String>,
    pub linkedin_handler: Option<String>,
    pub mood: Option<String>,
    #[schema(value_type = Object)]
    pub schedule: serde_json::Value,
}

/// Persistence entity: one row of the `accounts` table.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: String,
    pub otp: Option<String>,
    pub otp_attempt_count: i32,
    pub otp_expiry_time: Option<i64>,
    pub cooldown_time: Option<i64>,
    pub token: Option<String>,
    pub created_at: String,
    pub profile: Profile,
}

/// Response projection returned after verification and on protected routes.
#[derive(ToSchema, Serialize, Debug)]
pub struct AccountResponse {
    pub id: String,
    pub token: String,
    pub created_at: String,
    #[serde(flatten)]
    pub profile: Profile,
}

impl AccountResponse {
    /// Project an entity onto the wire, pairing it with the token that was
    /// just persisted for this request.
    #[must_use]
    pub fn project(account: Account, token: String) -> Self {
        Self {
            id: account.id,
            token,
            created_at: account.created_at,
            profile: account.profile,
        }
    }
}
