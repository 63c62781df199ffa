//! HTTP routing tests
//!
//! Drives `server::handle_request` directly with in-memory bodies, signing
//! in with a real ed25519 wallet.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use ed25519_dalek::{Signer, SigningKey};
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};

use starlight::config::Args;
use starlight::game::RewardRetryReceiver;
use starlight::server::{self, AppState};
use starlight::store::MemoryGameStore;

const LAT: f64 = 40.7580;
const LON: f64 = -73.9855;

struct Harness {
    state: Arc<AppState>,
    _retry: RewardRetryReceiver,
}

fn wallet(seed: u8) -> (SigningKey, String) {
    let key = SigningKey::from_bytes(&[seed; 32]);
    let address = hex::encode(key.verifying_key().to_bytes());
    (key, address)
}

fn harness(admin_wallet: &str) -> Harness {
    let args = Args::parse_from(["starlight", "--dev-mode", "--admin-wallets", admin_wallet]);
    let (state, retry) = AppState::new(args, Arc::new(MemoryGameStore::new()), "memory").unwrap();
    Harness {
        state: Arc::new(state),
        _retry: retry,
    }
}

fn addr() -> SocketAddr {
    "127.0.0.1:4000".parse().unwrap()
}

async fn call(h: &Harness, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, hyper::HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let payload = body.map(|b| b.to_string()).unwrap_or_default();
    let req = builder.body(Full::new(Bytes::from(payload))).unwrap();

    let resp = server::handle_request(h.state.clone(), addr(), req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, json)
}

async fn login(h: &Harness, key: &SigningKey, address: &str) -> Value {
    let (status, _, nonce) = call(
        h,
        Method::POST,
        "/auth/nonce",
        None,
        Some(json!({ "walletAddress": address })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let message = nonce["message"].as_str().unwrap();
    let signature = hex::encode(key.sign(message.as_bytes()).to_bytes());

    let (status, _, body) = call(
        h,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "walletAddress": address, "signature": signature })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body
}

async fn create_star(h: &Harness, token: &str) -> String {
    let (status, _, star) = call(
        h,
        Method::POST,
        "/stars",
        Some(token),
        Some(json!({
            "name": "Times Square Nova",
            "rarity": "epic",
            "type": "digital",
            "latitude": LAT,
            "longitude": LON,
            "rewards": { "experience": 120, "tokens": 15 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", star);
    star["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_unknown_route() {
    let h = harness("");

    let (status, _, body) = call(&h, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"], "memory");

    let (status, _, _) = call(&h, Method::GET, "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_protected_routes_need_token() {
    let h = harness("");

    let (status, _, body) = call(&h, Method::GET, "/location/nearby?latitude=1&longitude=1", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _, _) = call(&h, Method::GET, "/users/me", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_bad_signature() {
    let (_, address) = wallet(3);
    let (other_key, _) = wallet(4);
    let h = harness("");

    let (_, _, nonce) = call(
        &h,
        Method::POST,
        "/auth/nonce",
        None,
        Some(json!({ "walletAddress": address })),
    )
    .await;
    let message = nonce["message"].as_str().unwrap();
    let forged = hex::encode(other_key.sign(message.as_bytes()).to_bytes());

    let (status, _, _) = call(
        &h,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "walletAddress": address, "signature": forged })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The nonce was consumed by the failed attempt
    let (status, _, _) = call(
        &h,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "walletAddress": address, "signature": forged })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_players_cannot_create_stars() {
    let (key, address) = wallet(5);
    let h = harness("");
    let session = login(&h, &key, &address).await;
    assert_eq!(session["permissionLevel"], "PLAYER");

    let (status, _, _) = call(
        &h,
        Method::POST,
        "/stars",
        session["token"].as_str(),
        Some(json!({ "name": "Nope", "latitude": LAT, "longitude": LON })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_discover_over_http() {
    let (admin_key, admin_address) = wallet(1);
    let (player_key, player_address) = wallet(2);
    let h = harness(&admin_address);

    let admin = login(&h, &admin_key, &admin_address).await;
    assert_eq!(admin["permissionLevel"], "ADMIN");
    let star_id = create_star(&h, admin["token"].as_str().unwrap()).await;

    let player = login(&h, &player_key, &player_address).await;
    let token = player["token"].as_str().unwrap();

    let uri = format!("/location/nearby?latitude={}&longitude={}&radius=500", LAT, LON + 0.001);
    let (status, _, nearby) = call(&h, Method::GET, &uri, Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(nearby["count"], 1);
    assert_eq!(nearby["stars"][0]["id"], star_id.as_str());
    assert_eq!(nearby["stars"][0]["isNearby"], false);

    // About 85 m east is outside the discovery radius
    let (status, _, err) = call(
        &h,
        Method::POST,
        &format!("/location/discover/{}", star_id),
        Some(token),
        Some(json!({ "latitude": LAT, "longitude": LON + 0.001 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "TOO_FAR");
    assert!(err["distance"].as_f64().unwrap() > 50.0);

    let (status, _, found) = call(
        &h,
        Method::POST,
        &format!("/location/discover/{}", star_id),
        Some(token),
        Some(json!({ "latitude": LAT, "longitude": LON })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "discover failed: {}", found);
    assert_eq!(found["isPrimaryDiscoverer"], true);
    assert_eq!(found["rewardStatus"], "credited");
    assert_eq!(found["star"]["status"], "discovered");

    let (status, headers, again) = call(
        &h,
        Method::POST,
        &format!("/stars/{}/discover", star_id),
        Some(token),
        Some(json!({ "latitude": LAT, "longitude": LON })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["code"], "ALREADY_DISCOVERED");
    assert_eq!(headers.get("Deprecation").unwrap(), "true");

    let (status, _, me) = call(&h, Method::GET, "/users/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["level"], 2);
    assert_eq!(me["starsDiscovered"], 1);

    let (status, _, inbox) = call(&h, Method::GET, "/notifications?unread=true", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox["unreadCount"], 2);

    let (status, _, marked) = call(&h, Method::POST, "/notifications/read-all", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["updated"], 2);
}
