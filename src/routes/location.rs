//! Location routes
//!
//! - GET  /location/nearby?latitude&longitude&radius
//! - POST /location/discover/:starId
//! - POST /location/challenge/:starId/start
//! - POST /location/challenge/:starId/complete

use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{authenticate, parse_json_body, parse_query, respond, BoxBody};
use crate::game::discovery::{DEFAULT_NEARBY_RADIUS_METERS, MAX_NEARBY_RADIUS_METERS};
use crate::game::{
    ArProof, ChallengeDescriptor, ClaimOutcome, ConditionContext, DiscoveryOutcome, GeoPoint,
    NearbyStar,
};
use crate::server::AppState;
use crate::types::Result;

#[derive(Debug, Default, Deserialize)]
pub struct NearbyQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyResponse {
    pub stars: Vec<NearbyStar>,
    pub count: usize,
    pub radius: f64,
}

/// Body of a discover request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    /// Weather tag observed by the client
    pub weather: Option<String>,
}

impl DiscoverRequest {
    pub fn position(&self) -> Result<GeoPoint> {
        Ok(GeoPoint::from_parts(self.latitude, self.longitude)?.with_altitude(self.altitude))
    }

    pub fn context(&self) -> ConditionContext {
        ConditionContext {
            weather: self.weather.clone().filter(|w| !w.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub challenge: ChallengeDescriptor,
}

pub async fn handle_nearby<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody> {
    respond(StatusCode::OK, nearby(&req, &state).await)
}

async fn nearby<B>(req: &Request<B>, state: &AppState) -> Result<NearbyResponse> {
    let auth = authenticate(req, state)?;
    let query: NearbyQuery = parse_query(req)?;
    let position = GeoPoint::from_parts(query.latitude, query.longitude)?;

    let stars = state
        .discovery
        .nearby_stars(&auth.user_id, &position, query.radius)
        .await?;

    Ok(NearbyResponse {
        count: stars.len(),
        radius: query
            .radius
            .unwrap_or(DEFAULT_NEARBY_RADIUS_METERS)
            .min(MAX_NEARBY_RADIUS_METERS),
        stars,
    })
}

pub async fn handle_discover<B>(req: Request<B>, state: Arc<AppState>, star_id: &str) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    respond(StatusCode::OK, discover(req, &state, star_id).await)
}

pub(crate) async fn discover<B>(req: Request<B>, state: &AppState, star_id: &str) -> Result<DiscoveryOutcome>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    let auth = authenticate(&req, state)?;
    let body: DiscoverRequest = parse_json_body(req).await?;
    let position = body.position()?;

    state
        .discovery
        .discover_star(&auth.user_id, star_id, &position, &body.context())
        .await
}

pub async fn handle_challenge_start<B>(req: Request<B>, state: Arc<AppState>, star_id: &str) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    respond(StatusCode::OK, challenge_start(req, &state, star_id).await)
}

async fn challenge_start<B>(req: Request<B>, state: &AppState, star_id: &str) -> Result<ChallengeResponse>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    let auth = authenticate(&req, state)?;
    let body: PositionRequest = parse_json_body(req).await?;
    let position = GeoPoint::from_parts(body.latitude, body.longitude)?;

    let challenge = state
        .discovery
        .start_challenge(&auth.user_id, star_id, &position)
        .await?;
    Ok(ChallengeResponse { challenge })
}

pub async fn handle_challenge_complete<B>(req: Request<B>, state: Arc<AppState>, star_id: &str) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    respond(StatusCode::OK, challenge_complete(req, &state, star_id).await)
}

async fn challenge_complete<B>(req: Request<B>, state: &AppState, star_id: &str) -> Result<ClaimOutcome>
where
    B: Body,
    B::Error: Into<super::BoxError>,
{
    let auth = authenticate(&req, state)?;
    let proof: ArProof = parse_json_body(req).await?;

    state
        .discovery
        .complete_challenge(&auth.user_id, star_id, &proof)
        .await
}
