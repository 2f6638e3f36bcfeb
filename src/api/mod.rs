use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;

use crate::api::handlers::auth::{AuthConfig, AuthState};

pub mod email;
pub mod handlers;

use email::MailerConfig;

#[allow(unused_imports)]
use crate::api::handlers::{
    auth::request_otp::{__path_request_otp, request_otp},
    auth::session::{__path_update_session, update_session},
    auth::validate_otp::{__path_validate_otp, validate_otp},
    health::{__path_health, health},
    root,
};

#[derive(OpenApi)]
#[openapi(
    paths(health, request_otp, validate_otp, update_session),
    components(schemas(
        handlers::health::Health,
        handlers::auth::types::RequestOtp,
        handlers::auth::types::ValidateOtp,
        handlers::auth::types::AccountResponse,
        handlers::auth::types::Profile,
        handlers::auth::types::ErrorMessage,
    )),
    tags(
        (name = "auth", description = "OTP issuance, verification, and rotating-token sessions"),
        (name = "health", description = "Service health probes"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    mailer_config: &MailerConfig,
    auth_config: AuthConfig,
) -> Result<()> {
    // Fail fast on a bad mail transport before binding the listener.
    let mailer = email::build_mailer(mailer_config)?;

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let auth_state = Arc::new(AuthState::new(auth_config, mailer));

    let app = Router::new()
        .route("/request-otp", get(request_otp))
        .route("/validate-otp", post(validate_otp))
        .route("/update-session", get(update_session))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth_state)),
        )
        .route("/", get(root::root))
        .route("/health", get(health).options(health))
        .layer(Extension(pool));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
