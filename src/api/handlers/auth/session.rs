//! Protected session refresh endpoint.

use axum::{extract::Extension, http::HeaderMap, http::StatusCode, Json};
use std::sync::Arc;
use tracing::instrument;

use super::error::AuthError;
use super::principal::authenticate;
use super::state::AuthState;
use super::types::{AccountResponse, ErrorMessage};

/// Refresh the caller's session.
///
/// Authentication itself rotates the token, so the whole job here is handing
/// the refreshed account view back with the replacement token the client must
/// present on its next request.
#[utoipa::path(
    get,
    path = "/update-session",
    params(
        ("Authorization" = String, Header, description = "Current bearer token: <email>::<64-hex-secret>")
    ),
    responses(
        (status = 200, description = "Session refreshed; response carries the rotated token", body = AccountResponse),
        (status = 401, description = "Malformed, unknown, or already-rotated token", body = ErrorMessage),
        (status = 500, description = "Store failure", body = ErrorMessage)
    ),
    tag = "auth"
)]
#[instrument(skip(headers, pool, state))]
pub async fn update_session(
    headers: HeaderMap,
    pool: Extension<sqlx::PgPool>,
    state: Extension<Arc<AuthState>>,
) -> Result<(StatusCode, Json<AccountResponse>), AuthError> {
    let authed = authenticate(&headers, &state, &pool).await?;

    Ok((
        StatusCode::OK,
        Json(AccountResponse::project(authed.account, authed.token)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogMailer;
    use crate::api::handlers::auth::state::AuthConfig;
    use axum::http::{header::AUTHORIZATION, HeaderValue};
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
    async fn update_session_requires_authorization_header() {
        let response = update_session(HeaderMap::new(), lazy_pool(), auth_state())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn update_session_rejects_malformed_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("garbage-token"));
        let response = update_session(headers, lazy_pool(), auth_state())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
