//! Token authentication with single-use rotation.
//!
//! Protected handlers call [`authenticate`] and receive the refreshed account
//! plus the replacement token as an explicit value; nothing rides along in
//! request extensions.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use sqlx::PgPool;
use tracing::debug;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::rotate_token;
use super::token;
use super::types::Account;

/// The result of a successful authentication: the post-rotation account row
/// and the token the caller must use next.
pub struct AuthenticatedAccount {
    pub account: Account,
    pub token: String,
}

/// Validate the `Authorization: <email>::<64-hex>` header and atomically
/// rotate the token.
///
/// The replacement token is minted before the store is touched so a failed
/// mint cannot leave the account without a usable credential. The rotation
/// itself is one conditional update: of two requests racing with the same
/// still-valid token, exactly one observes a match and the other is rejected.
pub async fn authenticate(
    headers: &HeaderMap,
    state: &AuthState,
    pool: &PgPool,
) -> Result<AuthenticatedAccount, AuthError> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MalformedToken)?;

    let (id, _secret) = token::split(presented).ok_or(AuthError::MalformedToken)?;

    let replacement = token::issue(&id)?;

    let deadline = state.config().store_deadline();
    let updated = rotate_token(pool, deadline, &id, presented, &replacement)
        .await
        .map_err(AuthError::Store)?;

    match updated {
        Some(account) => Ok(AuthenticatedAccount {
            account,
            token: replacement,
        }),
        None => {
            // Wrong secret, unknown account, or a concurrent request already
            // rotated this token generation.
            debug!("token rotation found no matching account");
            Err(AuthError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogMailer;
    use crate::api::handlers::auth::state::AuthConfig;
    use axum::http::HeaderValue;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn auth_state() -> AuthState {
        AuthState::new(AuthConfig::new(), Arc::new(LogMailer))
    }

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool")
    }

    #[tokio::test]
    async fn authenticate_rejects_missing_header() {
        let result = authenticate(&HeaderMap::new(), &auth_state(), &lazy_pool()).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn authenticate_rejects_structurally_invalid_tokens() {
        for token in [
            "",
            "just-a-string",
            "a@b.com",
            "a@b.com::short",
            "not-an-email::0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
        ] {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_str(token).expect("header"));
            let result = authenticate(&headers, &auth_state(), &lazy_pool()).await;
            assert!(
                matches!(result, Err(AuthError::MalformedToken)),
                "token {token:?} should be malformed"
            );
        }
    }
}
