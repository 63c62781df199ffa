//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Routing is a plain
//! match on method and path segments.

use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{Ed25519WalletVerifier, JwtValidator, NonceStore, WalletVerifier};
use crate::config::Args;
use crate::game::{
    reward_retry_channel, spawn_reward_retry_task, ChallengeStore, DiscoveryService,
    InteractionVerifier, PassThroughVerifier, QuestService, RetryPolicy, RewardRetryReceiver,
    RewardSettlement,
};
use crate::notifications::NotificationStore;
use crate::routes::{self, BoxBody};
use crate::server::maintenance::spawn_maintenance_task;
use crate::store::GameStore;
use crate::types::StarlightError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: Arc<dyn GameStore>,
    /// "mongodb" or "memory"
    pub storage_backend: &'static str,
    pub jwt: JwtValidator,
    pub wallets: Arc<dyn WalletVerifier>,
    pub nonces: Arc<NonceStore>,
    pub challenges: Arc<ChallengeStore>,
    pub notifications: Arc<NotificationStore>,
    pub discovery: DiscoveryService,
    pub quests: QuestService,
    pub started_at: Instant,
}

impl AppState {
    /// Build the state with the default collaborators.
    ///
    /// The returned receiver must be handed to `run`, which drains it.
    pub fn new(
        args: Args,
        store: Arc<dyn GameStore>,
        storage_backend: &'static str,
    ) -> Result<(Self, RewardRetryReceiver), StarlightError> {
        Self::with_collaborators(
            args,
            store,
            storage_backend,
            Arc::new(Ed25519WalletVerifier::new()),
            Arc::new(PassThroughVerifier),
        )
    }

    /// Build the state with explicit wallet and AR verifiers
    pub fn with_collaborators(
        args: Args,
        store: Arc<dyn GameStore>,
        storage_backend: &'static str,
        wallets: Arc<dyn WalletVerifier>,
        interactions: Arc<dyn InteractionVerifier>,
    ) -> Result<(Self, RewardRetryReceiver), StarlightError> {
        let secret = args
            .jwt_secret()
            .ok_or_else(|| StarlightError::Config("JWT_SECRET is required in production mode".into()))?;
        let jwt = JwtValidator::new(secret, args.jwt_expiry_seconds)?;

        let nonces = Arc::new(NonceStore::new(args.nonce_ttl_secs));
        let challenges = Arc::new(ChallengeStore::new(args.challenge_ttl_secs));
        let notifications = Arc::new(NotificationStore::new());
        let (retry, receiver) = reward_retry_channel();

        let discovery = DiscoveryService::new(
            Arc::clone(&store),
            retry,
            notifications.clone(),
            Arc::clone(&challenges),
            interactions,
        );
        let quests = QuestService::new(Arc::clone(&store), notifications.clone());

        let state = Self {
            args,
            store,
            storage_backend,
            jwt,
            wallets,
            nonces,
            challenges,
            notifications,
            discovery,
            quests,
            started_at: Instant::now(),
        };
        Ok((state, receiver))
    }
}

/// Start the background tasks and the HTTP server
pub async fn run(state: Arc<AppState>, retry: RewardRetryReceiver) -> Result<(), StarlightError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Starlight listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - using development JWT secret unless JWT_SECRET is set");
    }

    spawn_reward_retry_task(
        retry,
        RewardSettlement::new(Arc::clone(&state.store)),
        state.notifications.clone(),
        RetryPolicy {
            max_attempts: state.args.reward_retry_max_attempts,
            ..RetryPolicy::default()
        },
    );
    spawn_maintenance_task(
        Arc::clone(&state),
        Duration::from_secs(state.args.expiry_sweep_secs),
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
pub async fn handle_request<B>(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<B>,
) -> Result<Response<BoxBody>, hyper::Error>
where
    B: Body,
    B::Error: Into<routes::BoxError>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(routes::cors_preflight());
    }

    // Auth routes consume the request
    if path.starts_with("/auth") {
        if let Some(response) = routes::handle_auth_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(routes::not_found_response(&path));
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let response = match (&method, segments.as_slice()) {
        // Health check endpoints
        (&Method::GET, ["health"]) | (&Method::GET, ["healthz"]) => routes::health_check(&state),
        (&Method::GET, ["version"]) => routes::version_info(),

        // Location
        (&Method::GET, ["location", "nearby"]) => routes::location::handle_nearby(req, state).await,
        (&Method::POST, ["location", "discover", star_id]) => {
            routes::location::handle_discover(req, state, star_id).await
        }
        (&Method::POST, ["location", "challenge", star_id, "start"]) => {
            routes::location::handle_challenge_start(req, state, star_id).await
        }
        (&Method::POST, ["location", "challenge", star_id, "complete"]) => {
            routes::location::handle_challenge_complete(req, state, star_id).await
        }

        // Stars
        (&Method::POST, ["stars"]) => routes::stars::handle_create_star(req, state).await,
        (&Method::GET, ["stars", star_id]) => routes::stars::handle_get_star(req, state, star_id).await,
        (&Method::POST, ["stars", star_id, "discover"]) => {
            routes::stars::handle_legacy_discover(req, state, star_id).await
        }

        // Players
        (&Method::GET, ["users", "me"]) => routes::users::handle_me(req, state).await,
        (&Method::GET, ["leaderboard"]) => routes::users::handle_leaderboard(req, state).await,

        // Quests
        (&Method::GET, ["quests"]) => routes::quests::handle_list_quests(req, state).await,
        (&Method::GET, ["quests", quest_id]) => routes::quests::handle_get_quest(req, state, quest_id).await,
        (&Method::POST, ["quests", quest_id, "join"]) => {
            routes::quests::handle_join_quest(req, state, quest_id).await
        }

        // Notifications
        (&Method::GET, ["notifications"]) => routes::notifications::handle_list(req, state).await,
        (&Method::POST, ["notifications", "read-all"]) => {
            routes::notifications::handle_mark_all_read(req, state).await
        }
        (&Method::POST, ["notifications", notification_id, "read"]) => {
            routes::notifications::handle_mark_read(req, state, notification_id).await
        }

        // Not found
        _ => routes::not_found_response(&path),
    };

    Ok(response)
}
