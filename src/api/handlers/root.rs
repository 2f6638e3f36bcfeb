use axum::response::IntoResponse;

// axum handler for the root route
pub async fn root() -> impl IntoResponse {
    "Hello, World!"
}
