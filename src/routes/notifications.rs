//! Notification routes
//!
//! - GET  /notifications?unread=true
//! - POST /notifications/:id/read
//! - POST /notifications/read-all

use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{authenticate, parse_query, respond, BoxBody};
use crate::notifications::Notification;
use crate::server::AppState;
use crate::types::{Result, StarlightError};

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

pub async fn handle_list<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody> {
    respond(StatusCode::OK, list(&req, &state))
}

fn list<B>(req: &Request<B>, state: &AppState) -> Result<NotificationList> {
    let auth = authenticate(req, state)?;
    let query: NotificationQuery = parse_query(req)?;
    Ok(NotificationList {
        notifications: state.notifications.list(&auth.user_id, query.unread),
        unread_count: state.notifications.unread_count(&auth.user_id),
    })
}

pub async fn handle_mark_read<B>(req: Request<B>, state: Arc<AppState>, notification_id: &str) -> Response<BoxBody> {
    respond(StatusCode::OK, mark_read(&req, &state, notification_id))
}

fn mark_read<B>(req: &Request<B>, state: &AppState, notification_id: &str) -> Result<serde_json::Value> {
    let auth = authenticate(req, state)?;
    if !state.notifications.mark_read(&auth.user_id, notification_id) {
        return Err(StarlightError::NotFound("Notification not found".into()));
    }
    Ok(serde_json::json!({ "success": true }))
}

pub async fn handle_mark_all_read<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody> {
    respond(StatusCode::OK, mark_all_read(&req, &state))
}

fn mark_all_read<B>(req: &Request<B>, state: &AppState) -> Result<serde_json::Value> {
    let auth = authenticate(req, state)?;
    let updated = state.notifications.mark_all_read(&auth.user_id);
    Ok(serde_json::json!({ "success": true, "updated": updated }))
}
