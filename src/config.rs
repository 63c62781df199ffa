//! Configuration for Starlight
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Minimum JWT secret length accepted outside dev mode
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Longest accepted challenge or nonce lifetime (one week)
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest reward reconciliation window (thirty days)
pub const MAX_RECONCILE_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

/// Starlight - location-based AR collectible game backend
#[derive(Parser, Debug, Clone)]
#[command(name = "starlight")]
#[command(about = "Discover, claim and collect stars near real-world locations")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (dev JWT secret, in-memory store fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "starlight")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "86400")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Comma-separated wallet addresses granted admin permission
    #[arg(long, env = "ADMIN_WALLETS")]
    pub admin_wallets: Option<String>,

    /// How long an AR challenge stays open, in seconds
    #[arg(long, env = "CHALLENGE_TTL_SECS", default_value = "300")]
    pub challenge_ttl_secs: u64,

    /// How long a sign-in nonce stays valid, in seconds
    #[arg(long, env = "NONCE_TTL_SECS", default_value = "300")]
    pub nonce_ttl_secs: u64,

    /// Interval of the star expiry sweep, in seconds
    #[arg(long, env = "EXPIRY_SWEEP_SECS", default_value = "60")]
    pub expiry_sweep_secs: u64,

    /// How far back the maintenance sweep looks for stars whose rewards
    /// never landed, in seconds
    #[arg(long, env = "REWARD_RECONCILE_WINDOW_SECS", default_value = "86400")]
    pub reward_reconcile_window_secs: u64,

    /// Attempts made to deliver a reward credit that failed inline
    #[arg(long, env = "REWARD_RETRY_MAX_ATTEMPTS", default_value = "5")]
    pub reward_retry_max_attempts: u32,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> Option<String> {
        if self.dev_mode {
            Some(
                self.jwt_secret
                    .clone()
                    .unwrap_or_else(|| "dev-only-insecure-secret-for-starlight-local".to_string()),
            )
        } else {
            self.jwt_secret.clone()
        }
    }

    /// Admin wallet addresses, lowercased
    pub fn admin_wallet_list(&self) -> Vec<String> {
        self.admin_wallets
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check if a (normalized) wallet address has admin permission
    pub fn is_admin_wallet(&self, wallet_address: &str) -> bool {
        self.admin_wallet_list()
            .iter()
            .any(|w| w == wallet_address)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < MIN_JWT_SECRET_LEN => {
                    return Err(format!(
                        "JWT_SECRET must be at least {} characters",
                        MIN_JWT_SECRET_LEN
                    ))
                }
                Some(_) => {}
            }
        }

        if self.log_format != "text" && self.log_format != "json" {
            return Err("LOG_FORMAT must be 'text' or 'json'".to_string());
        }

        if self.challenge_ttl_secs == 0 || self.nonce_ttl_secs == 0 {
            return Err("CHALLENGE_TTL_SECS and NONCE_TTL_SECS must be positive".to_string());
        }

        if self.challenge_ttl_secs > MAX_TTL_SECS || self.nonce_ttl_secs > MAX_TTL_SECS {
            return Err(format!(
                "CHALLENGE_TTL_SECS and NONCE_TTL_SECS must not exceed {}",
                MAX_TTL_SECS
            ));
        }

        if self.expiry_sweep_secs == 0 {
            return Err("EXPIRY_SWEEP_SECS must be positive".to_string());
        }

        if self.reward_reconcile_window_secs == 0 || self.reward_reconcile_window_secs > MAX_RECONCILE_WINDOW_SECS {
            return Err(format!(
                "REWARD_RECONCILE_WINDOW_SECS must be between 1 and {}",
                MAX_RECONCILE_WINDOW_SECS
            ));
        }

        if self.reward_retry_max_attempts == 0 {
            return Err("REWARD_RETRY_MAX_ATTEMPTS must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["starlight"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_production_requires_secret() {
        let args = parse(&[]);
        if args.jwt_secret.is_none() {
            assert!(args.validate().is_err());
        }

        let args = parse(&["--jwt-secret", "short"]);
        assert!(args.validate().is_err());

        let args = parse(&["--jwt-secret", "a-secret-that-is-long-enough-for-hs256-use"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_dev_mode_defaults_secret() {
        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
        assert!(args.jwt_secret().is_some());
    }

    #[test]
    fn test_admin_wallets_are_normalized() {
        let args = parse(&["--dev-mode", "--admin-wallets", " 0xABCDEF , ,abc123"]);
        assert_eq!(args.admin_wallet_list(), vec!["0xabcdef", "abc123"]);
        assert!(args.is_admin_wallet("abc123"));
        assert!(!args.is_admin_wallet("0xdead"));
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let args = parse(&["--dev-mode", "--log-format", "xml"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_rejects_unbounded_ttls() {
        let args = parse(&["--dev-mode", "--challenge-ttl-secs", "18446744073709551615"]);
        assert!(args.validate().is_err());

        let args = parse(&["--dev-mode", "--nonce-ttl-secs", "604801"]);
        assert!(args.validate().is_err());

        let args = parse(&["--dev-mode", "--nonce-ttl-secs", "604800"]);
        assert!(args.validate().is_ok());
    }
}
