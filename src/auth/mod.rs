//! Authentication and authorization for Starlight
//!
//! Provides:
//! - Wallet signature login with single-use nonces
//! - JWT session token generation and validation
//! - Permission levels for admin-only operations

pub mod jwt;
pub mod nonce;
pub mod permissions;
pub mod wallet;

pub use jwt::{extract_token_from_header, AuthUser, Claims, IssuedToken, JwtValidator};
pub use nonce::{sign_in_message, IssuedNonce, NonceStore};
pub use permissions::{is_allowed, PermissionLevel};
pub use wallet::{normalize_wallet_address, Ed25519WalletVerifier, WalletVerifier};
