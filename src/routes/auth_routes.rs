//! HTTP Routes for wallet authentication
//!
//! Provides REST API endpoints for wallet sign-in:
//! - POST /auth/nonce - Issue a single-use message for the wallet to sign
//! - POST /auth/login - Verify the signature and get a JWT token
//! - GET  /auth/me    - Get current identity from token
//!
//! Login creates the player on first sign-in.

use chrono::{DateTime, Utc};
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::users::UserView;
use super::{authenticate, cors_preflight, json_response, parse_json_body, respond, BoxBody};
use crate::auth::{normalize_wallet_address, PermissionLevel};
use crate::db::schemas::UserDoc;
use crate::server::AppState;
use crate::types::{Result, StarlightError};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceRequest {
    pub wallet_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    pub nonce: String,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub wallet_address: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: u64,
    pub permission_level: PermissionLevel,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub wallet_address: String,
    pub permission_level: PermissionLevel,
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /auth/nonce
async fn handle_nonce<B>(req: Request<B>, state: Arc<AppState>) -> Result<NonceResponse>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    let body: NonceRequest = parse_json_body(req).await?;
    let wallet = normalize_wallet_address(&body.wallet_address)?;

    let issued = state.nonces.issue(&wallet, Utc::now());
    Ok(NonceResponse {
        nonce: issued.nonce,
        message: issued.message,
        expires_at: issued.expires_at,
    })
}

/// POST /auth/login
///
/// Flow:
/// 1. Consume the outstanding nonce for the wallet
/// 2. Verify the signature over the sign-in message
/// 3. Find or create the player
/// 4. Generate and return JWT token
async fn handle_login<B>(req: Request<B>, state: Arc<AppState>) -> Result<LoginResponse>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    let body: LoginRequest = parse_json_body(req).await?;
    let wallet = normalize_wallet_address(&body.wallet_address)?;
    if body.signature.trim().is_empty() {
        return Err(StarlightError::Validation("signature is required".into()));
    }

    let message = state
        .nonces
        .take(&wallet, Utc::now())
        .ok_or_else(|| StarlightError::Unauthorized("No pending sign-in nonce for wallet".into()))?;

    let verified = state
        .wallets
        .verify_signature(&message, &body.signature, &wallet)
        .await
        .map_err(|e| match e {
            StarlightError::Upstream(_) => e,
            other => StarlightError::Upstream(format!("Signature verification failed: {}", other)),
        })?;
    if !verified {
        warn!("Rejected sign-in signature for {}", wallet);
        return Err(StarlightError::Unauthorized("Invalid wallet signature".into()));
    }

    let user = find_or_create_user(&state, &wallet).await?;
    let permission_level = if state.args.is_admin_wallet(&wallet) {
        PermissionLevel::Admin
    } else {
        PermissionLevel::Player
    };

    let issued = state
        .jwt
        .generate_token(&user.id_hex(), &wallet, permission_level)?;

    info!("Wallet signed in: {} ({})", wallet, permission_level);

    Ok(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        permission_level,
        user: UserView::from(&user),
    })
}

async fn find_or_create_user(state: &AppState, wallet: &str) -> Result<UserDoc> {
    if let Some(user) = state.store.find_user_by_wallet(wallet).await? {
        return Ok(user);
    }

    match state.store.insert_user(UserDoc::new(wallet.to_string())).await {
        Ok(user) => {
            info!("Registered new player: {}", wallet);
            Ok(user)
        }
        // Lost a race with a concurrent first login
        Err(StarlightError::Conflict(_)) => state
            .store
            .find_user_by_wallet(wallet)
            .await?
            .ok_or_else(|| StarlightError::Internal("User vanished after conflict".into())),
        Err(e) => Err(e),
    }
}

/// GET /auth/me
async fn handle_me<B>(req: Request<B>, state: Arc<AppState>) -> Result<MeResponse> {
    let auth = authenticate(&req, &state)?;
    Ok(MeResponse {
        user_id: auth.user_id,
        wallet_address: auth.wallet_address,
        permission_level: auth.permission_level,
    })
}

/// Handle /auth/* requests. Returns None for paths outside /auth.
pub async fn handle_auth_request<B>(req: Request<B>, state: Arc<AppState>) -> Option<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if !path.starts_with("/auth") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = match (&method, path.as_str()) {
        (&Method::POST, "/auth/nonce") => respond(StatusCode::OK, handle_nonce(req, state).await),
        (&Method::POST, "/auth/login") => respond(StatusCode::OK, handle_login(req, state).await),
        (&Method::GET, "/auth/me") => respond(StatusCode::OK, handle_me(req, state).await),

        (_, "/auth/nonce") | (_, "/auth/login") | (_, "/auth/me") => super::method_not_allowed(),

        _ => json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({
                "error": "Auth endpoint not found",
                "code": "NOT_FOUND",
            }),
        ),
    };

    Some(response)
}
