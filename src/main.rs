//! Starlight - location-based AR collectible game backend

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use starlight::{
    config::Args,
    db::MongoClient,
    server,
    store::{GameStore, MemoryGameStore, MongoGameStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("starlight={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Starlight - AR star hunt backend");
    info!("  Version: {}", env!("GIT_COMMIT_SHORT"));
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} ({})", args.mongodb_uri, args.mongodb_db);
    info!("======================================");

    // Connect to MongoDB (in-memory fallback in dev mode)
    let connected = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => MongoGameStore::new(&client).await,
        Err(e) => Err(e),
    };
    let (store, backend): (Arc<dyn GameStore>, &'static str) = match connected {
        Ok(store) => {
            info!("MongoDB connected successfully");
            (Arc::new(store), "mongodb")
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB unavailable (dev mode, using in-memory store): {}", e);
                (Arc::new(MemoryGameStore::new()), "memory")
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let (state, retry) = match server::AppState::new(args, store, backend) {
        Ok(built) => built,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::run(Arc::new(state), retry).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
