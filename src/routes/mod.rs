//! HTTP routes for Starlight
//!
//! Handlers return `Result<T>` and are turned into JSON responses at the
//! edge by `respond`, so every failure goes through the same error body.

pub mod auth_routes;
pub mod health;
pub mod location;
pub mod notifications;
pub mod quests;
pub mod stars;
pub mod users;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::error;

use crate::auth::{extract_token_from_header, is_allowed, AuthUser, PermissionLevel};
use crate::server::AppState;
use crate::types::{Result, StarlightError};

pub use auth_routes::handle_auth_request;
pub use health::{health_check, version_info};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Error type request bodies must convert into
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Largest JSON body accepted
pub const MAX_BODY_BYTES: usize = 16 * 1024;

// =============================================================================
// Response Helpers
// =============================================================================

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

pub fn error_response(err: &StarlightError) -> Response<BoxBody> {
    let status = err.status_code();
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    json_response(status, &err.to_body())
}

/// Serialize a handler result with `status` on success
pub fn respond<T: Serialize>(status: StatusCode, result: Result<T>) -> Response<BoxBody> {
    match result {
        Ok(body) => json_response(status, &body),
        Err(e) => error_response(&e),
    }
}

pub fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

pub fn not_found_response(path: &str) -> Response<BoxBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "error": "Not Found",
            "code": "NOT_FOUND",
            "path": path,
        }),
    )
}

pub fn method_not_allowed() -> Response<BoxBody> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({
            "error": "Method not allowed",
            "code": "METHOD_NOT_ALLOWED",
        }),
    )
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Read and decode a JSON request body
///
/// Reading stops with a validation error as soon as more than
/// `MAX_BODY_BYTES` have arrived.
pub async fn parse_json_body<B, T>(req: Request<B>) -> Result<T>
where
    B: Body,
    B::Error: Into<BoxError>,
    T: DeserializeOwned,
{
    let body = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                StarlightError::Validation("Request body too large".into())
            } else {
                StarlightError::Validation(format!("Failed to read body: {}", e))
            }
        })?;

    serde_json::from_slice(&body.to_bytes())
        .map_err(|e| StarlightError::Validation(format!("Invalid JSON body: {}", e)))
}

/// Decode the query string, treating a missing one as empty
pub fn parse_query<B, T: DeserializeOwned>(req: &Request<B>) -> Result<T> {
    serde_urlencoded::from_str(req.uri().query().unwrap_or(""))
        .map_err(|e| StarlightError::Validation(format!("Invalid query: {}", e)))
}

/// Resolve the bearer token on the request
pub fn authenticate<B>(req: &Request<B>, state: &AppState) -> Result<AuthUser> {
    let header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = extract_token_from_header(header)
        .ok_or_else(|| StarlightError::Unauthorized("Missing bearer token".into()))?;

    let claims = state.jwt.verify_token(token)?;
    Ok(AuthUser::from(claims))
}

pub fn require_admin(user: &AuthUser) -> Result<()> {
    if is_allowed(user.permission_level, PermissionLevel::Admin) {
        Ok(())
    } else {
        Err(StarlightError::Forbidden("Admin permission required".into()))
    }
}
