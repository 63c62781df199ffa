//! Star routes
//!
//! - GET  /stars/:id
//! - POST /stars              (admin) author a hidden star
//! - POST /stars/:id/discover deprecated alias of /location/discover/:id

use chrono::{DateTime, Utc};
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{authenticate, parse_json_body, require_admin, respond, BoxBody};
use crate::db::schemas::{Rarity, StarConditions, StarDoc, StarRewards, StarType};
use crate::game::{GeoPoint, StarView};
use crate::server::AppState;
use crate::types::{Result, StarlightError};

/// Upper bound for authored experience and token rewards
pub const MAX_STAR_REWARD: u64 = 1_000_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStarRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(rename = "type", default)]
    pub star_type: StarType,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    #[serde(default)]
    pub rewards: StarRewards,
    #[serde(default)]
    pub conditions: StarConditions,
    pub expires_at: Option<DateTime<Utc>>,
    pub quest_id: Option<String>,
}

impl CreateStarRequest {
    fn into_doc(self) -> Result<StarDoc> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(StarlightError::Validation("name is required".into()));
        }
        if let Some(window) = &self.conditions.time_of_day {
            if window.start_hour > 23 || window.end_hour > 23 {
                return Err(StarlightError::Validation(
                    "timeOfDay hours must be between 0 and 23".into(),
                ));
            }
        }
        let tokens = self.rewards.tokens.unwrap_or(0);
        if self.rewards.experience > MAX_STAR_REWARD || tokens > MAX_STAR_REWARD {
            return Err(StarlightError::Validation(format!(
                "rewards must not exceed {}",
                MAX_STAR_REWARD
            )));
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= Utc::now() {
                return Err(StarlightError::Validation("expiresAt must be in the future".into()));
            }
        }

        let location = GeoPoint::from_parts(self.latitude, self.longitude)?.with_altitude(self.altitude);
        let mut star = StarDoc::new(name, self.rarity, self.star_type, location, self.rewards);
        star.description = self.description;
        star.conditions = self.conditions;
        star.expires_at = self.expires_at.map(bson::DateTime::from_chrono);
        star.quest_id = self.quest_id;
        Ok(star)
    }
}

pub async fn handle_get_star<B>(req: Request<B>, state: Arc<AppState>, star_id: &str) -> Response<BoxBody> {
    respond(StatusCode::OK, get_star(&req, &state, star_id).await)
}

async fn get_star<B>(req: &Request<B>, state: &AppState, star_id: &str) -> Result<StarView> {
    authenticate(req, state)?;
    let star = state
        .store
        .find_star(star_id)
        .await?
        .ok_or_else(|| StarlightError::NotFound("Star not found".into()))?;
    Ok(StarView::from(&star))
}

pub async fn handle_create_star<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    respond(StatusCode::CREATED, create_star(req, &state).await)
}

async fn create_star<B>(req: Request<B>, state: &AppState) -> Result<StarView>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    let auth = authenticate(&req, state)?;
    require_admin(&auth)?;

    let body: CreateStarRequest = parse_json_body(req).await?;
    let star = body.into_doc()?;
    let view = StarView::from(&star);
    let star_id = state.store.insert_star(star).await?;

    info!(star = %star_id, admin = %auth.wallet_address, "Star created");
    Ok(view)
}

/// Deprecated single-step discover; forwards to the canonical flow
pub async fn handle_legacy_discover<B>(req: Request<B>, state: Arc<AppState>, star_id: &str) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    warn!("Deprecated route POST /stars/{}/discover used", star_id);

    let mut response = respond(StatusCode::OK, super::location::discover(req, &state, star_id).await);
    response
        .headers_mut()
        .insert("Deprecation", hyper::header::HeaderValue::from_static("true"));
    response.headers_mut().insert(
        hyper::header::LINK,
        hyper::header::HeaderValue::from_static("</location/discover/{starId}>; rel=\"successor-version\""),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::StarStatus;

    #[test]
    fn test_create_request_builds_hidden_star() {
        let req: CreateStarRequest = serde_json::from_str(
            r#"{
                "name": " Polaris ",
                "rarity": "legendary",
                "type": "crystal",
                "latitude": 64.1,
                "longitude": -21.9,
                "rewards": {"experience": 500, "tokens": 50, "specialItem": "north-shard"}
            }"#,
        )
        .unwrap();

        let star = req.into_doc().unwrap();
        assert_eq!(star.name, "Polaris");
        assert_eq!(star.status, StarStatus::Hidden);
        assert_eq!(star.rarity, Rarity::Legendary);
        assert_eq!(star.star_type, StarType::Crystal);
        assert_eq!(star.rewards.special_item.as_deref(), Some("north-shard"));
    }

    #[test]
    fn test_create_request_validation() {
        let blank: CreateStarRequest =
            serde_json::from_str(r#"{"name": "  ", "latitude": 1.0, "longitude": 1.0}"#).unwrap();
        assert!(blank.into_doc().is_err());

        let off_map: CreateStarRequest =
            serde_json::from_str(r#"{"name": "x", "latitude": 91.0, "longitude": 1.0}"#).unwrap();
        assert!(off_map.into_doc().is_err());

        let bad_hours: CreateStarRequest = serde_json::from_str(
            r#"{"name": "x", "latitude": 1.0, "longitude": 1.0,
                "conditions": {"timeOfDay": {"startHour": 22, "endHour": 30}}}"#,
        )
        .unwrap();
        assert!(bad_hours.into_doc().is_err());
    }

    #[test]
    fn test_create_request_rejects_oversized_rewards() {
        let huge_exp: CreateStarRequest = serde_json::from_str(
            r#"{"name": "x", "latitude": 1.0, "longitude": 1.0,
                "rewards": {"experience": 18446744073709551615}}"#,
        )
        .unwrap();
        assert!(matches!(huge_exp.into_doc(), Err(StarlightError::Validation(_))));

        let huge_tokens: CreateStarRequest = serde_json::from_str(
            r#"{"name": "x", "latitude": 1.0, "longitude": 1.0,
                "rewards": {"experience": 10, "tokens": 1000001}}"#,
        )
        .unwrap();
        assert!(matches!(huge_tokens.into_doc(), Err(StarlightError::Validation(_))));

        let at_cap: CreateStarRequest = serde_json::from_str(
            r#"{"name": "x", "latitude": 1.0, "longitude": 1.0,
                "rewards": {"experience": 1000000, "tokens": 1000000}}"#,
        )
        .unwrap();
        assert!(at_cap.into_doc().is_ok());
    }
}
