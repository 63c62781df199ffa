//! Player profile and leaderboard routes
//!
//! - GET /users/me
//! - GET /leaderboard?by=level|discovered|collected&limit=N

use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{authenticate, parse_query, respond, BoxBody};
use crate::db::schemas::UserDoc;
use crate::game::required_experience;
use crate::server::AppState;
use crate::store::LeaderboardKind;
use crate::types::{Result, StarlightError};

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

/// Player profile
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub wallet_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub level: u32,
    pub experience: u64,
    pub experience_to_next_level: u64,
    pub stars_discovered: u64,
    pub stars_collected: u64,
    pub tokens: u64,
    pub streak: u32,
    pub inventory: Vec<String>,
    pub quests: Vec<String>,
}

impl From<&UserDoc> for UserView {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id_hex(),
            wallet_address: user.wallet_address.clone(),
            username: user.username.clone(),
            level: user.level,
            experience: user.experience,
            experience_to_next_level: required_experience(user.level).saturating_sub(user.experience),
            stars_discovered: user.stars_discovered,
            stars_collected: user.stars_collected,
            tokens: user.tokens,
            streak: user.streak,
            inventory: user.inventory.clone(),
            quests: user.quests.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub by: LeaderboardKind,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub wallet_address: String,
    pub level: u32,
    pub experience: u64,
    pub stars_discovered: u64,
    pub stars_collected: u64,
}

pub async fn handle_me<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody> {
    respond(StatusCode::OK, current_user(&req, &state).await)
}

async fn current_user<B>(req: &Request<B>, state: &AppState) -> Result<UserView> {
    let auth = authenticate(req, state)?;
    let user = state
        .store
        .find_user(&auth.user_id)
        .await?
        .ok_or_else(|| StarlightError::NotFound("User not found".into()))?;
    Ok(UserView::from(&user))
}

pub async fn handle_leaderboard<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody> {
    respond(StatusCode::OK, leaderboard(&req, &state).await)
}

async fn leaderboard<B>(req: &Request<B>, state: &AppState) -> Result<serde_json::Value> {
    authenticate(req, state)?;
    let query: LeaderboardQuery = parse_query(req)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);

    let users = state.store.top_users(query.by, limit).await?;
    let entries: Vec<LeaderboardEntry> = users
        .iter()
        .enumerate()
        .map(|(i, u)| LeaderboardEntry {
            rank: i + 1,
            user_id: u.id_hex(),
            username: u.username.clone(),
            wallet_address: u.wallet_address.clone(),
            level: u.level,
            experience: u.experience,
            stars_discovered: u.stars_discovered,
            stars_collected: u.stars_collected,
        })
        .collect();

    Ok(serde_json::json!({ "by": query.by, "entries": entries }))
}
