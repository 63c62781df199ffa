//! Wallet signature verification
//!
//! Players sign in by signing a server-issued message with their wallet key.
//! The default verifier treats a wallet address as a hex-encoded ed25519
//! public key (optionally `0x`-prefixed) and the signature as a hex-encoded
//! ed25519 signature over the exact message bytes.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::types::StarlightError;

/// Verifies wallet signatures during login
#[async_trait::async_trait]
pub trait WalletVerifier: Send + Sync {
    /// Returns true if `signature` is a valid signature of `message` by `address`
    async fn verify_signature(
        &self,
        message: &str,
        signature: &str,
        address: &str,
    ) -> Result<bool, StarlightError>;
}

/// Normalize a wallet address for identity lookups (trimmed, lowercase)
pub fn normalize_wallet_address(address: &str) -> Result<String, StarlightError> {
    let normalized = address.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(StarlightError::Validation("walletAddress is required".into()));
    }
    if normalized.chars().any(char::is_whitespace) {
        return Err(StarlightError::Validation(
            "walletAddress must not contain whitespace".into(),
        ));
    }
    Ok(normalized)
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    let trimmed = value.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(stripped).ok()
}

/// Ed25519 wallet verifier
#[derive(Debug, Clone, Default)]
pub struct Ed25519WalletVerifier;

impl Ed25519WalletVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous verification used by the trait implementation
    pub fn verify(&self, message: &str, signature: &str, address: &str) -> bool {
        let key_bytes: [u8; 32] = match decode_hex(address).and_then(|b| b.try_into().ok()) {
            Some(bytes) => bytes,
            None => return false,
        };
        let sig_bytes: [u8; 64] = match decode_hex(signature).and_then(|b| b.try_into().ok()) {
            Some(bytes) => bytes,
            None => return false,
        };

        let key = match VerifyingKey::from_bytes(&key_bytes) {
            Ok(k) => k,
            Err(_) => return false,
        };
        let sig = Signature::from_bytes(&sig_bytes);

        key.verify(message.as_bytes(), &sig).is_ok()
    }
}

#[async_trait::async_trait]
impl WalletVerifier for Ed25519WalletVerifier {
    async fn verify_signature(
        &self,
        message: &str,
        signature: &str,
        address: &str,
    ) -> Result<bool, StarlightError> {
        Ok(self.verify(message, signature, address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    fn keypair() -> (SigningKey, String) {
        let signing = SigningKey::generate(&mut OsRng);
        let address = format!("0x{}", hex::encode(signing.verifying_key().to_bytes()));
        (signing, address)
    }

    #[test]
    fn test_valid_signature() {
        let (signing, address) = keypair();
        let message = "Sign in to Starlight: abc";
        let signature = hex::encode(signing.sign(message.as_bytes()).to_bytes());

        let verifier = Ed25519WalletVerifier::new();
        assert!(verifier.verify(message, &signature, &address));
        // Address case does not matter
        assert!(verifier.verify(message, &signature, &address.to_uppercase()));
    }

    #[test]
    fn test_signature_over_other_message_fails() {
        let (signing, address) = keypair();
        let signature = hex::encode(signing.sign(b"something else").to_bytes());

        assert!(!Ed25519WalletVerifier::new().verify("Sign in", &signature, &address));
    }

    #[test]
    fn test_malformed_inputs_fail() {
        let verifier = Ed25519WalletVerifier::new();
        assert!(!verifier.verify("m", "zz", "0x1234"));
        assert!(!verifier.verify("m", &"00".repeat(64), "not-hex"));
    }

    #[test]
    fn test_normalize_wallet_address() {
        assert_eq!(normalize_wallet_address("  0xABCdef ").unwrap(), "0xabcdef");
        assert!(normalize_wallet_address("   ").is_err());
        assert!(normalize_wallet_address("0xab cd").is_err());
    }

    #[tokio::test]
    async fn test_trait_object() {
        let (signing, address) = keypair();
        let signature = hex::encode(signing.sign(b"hello").to_bytes());
        let verifier: Box<dyn WalletVerifier> = Box::new(Ed25519WalletVerifier::new());

        assert!(verifier
            .verify_signature("hello", &signature, &address)
            .await
            .unwrap());
    }
}
