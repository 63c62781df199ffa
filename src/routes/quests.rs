//! Quest routes
//!
//! - GET  /quests?active=true|false
//! - GET  /quests/:id
//! - POST /quests/:id/join

use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use super::{authenticate, parse_query, respond, BoxBody};
use crate::game::QuestView;
use crate::server::AppState;
use crate::types::Result;

#[derive(Debug, Deserialize)]
pub struct QuestListQuery {
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

pub async fn handle_list_quests<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody> {
    respond(StatusCode::OK, list_quests(&req, &state).await)
}

async fn list_quests<B>(req: &Request<B>, state: &AppState) -> Result<serde_json::Value> {
    authenticate(req, state)?;
    let query: QuestListQuery = parse_query(req)?;
    let quests = state.quests.list(query.active).await?;
    Ok(serde_json::json!({ "count": quests.len(), "quests": quests }))
}

pub async fn handle_get_quest<B>(req: Request<B>, state: Arc<AppState>, quest_id: &str) -> Response<BoxBody> {
    respond(StatusCode::OK, get_quest(&req, &state, quest_id).await)
}

async fn get_quest<B>(req: &Request<B>, state: &AppState, quest_id: &str) -> Result<QuestView> {
    authenticate(req, state)?;
    state.quests.get(quest_id).await
}

pub async fn handle_join_quest<B>(req: Request<B>, state: Arc<AppState>, quest_id: &str) -> Response<BoxBody> {
    respond(StatusCode::OK, join_quest(&req, &state, quest_id).await)
}

async fn join_quest<B>(req: &Request<B>, state: &AppState, quest_id: &str) -> Result<QuestView> {
    let auth = authenticate(req, state)?;
    state.quests.join(&auth.user_id, quest_id).await
}
