//! Signing key handling.
//!
//! Accepts a NIP-19 `nsec1…` string or 64 hex characters.

use std::fmt;

use secp256k1::{Keypair, Message, Secp256k1, XOnlyPublicKey, schnorr};

use crate::error::{AppError, Result};
use crate::models::Credential;

const SECRET_KEY_HRP: &str = "nsec";

/// Keypair used to sign notes.
pub struct SigningKey {
    secp: Secp256k1<secp256k1::All>,
    keypair: Keypair,
}

impl SigningKey {
    /// Decode a credential from the configuration.
    pub fn from_credential(credential: &Credential) -> Result<Self> {
        Self::parse(credential.expose())
    }

    /// Decode `nsec1…` or hex secret key material.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let bytes = if value.to_ascii_lowercase().starts_with("nsec1") {
            let (hrp, data) = bech32::decode(value).map_err(AppError::key)?;
            if hrp.to_string().to_ascii_lowercase() != SECRET_KEY_HRP {
                return Err(AppError::key(format!("expected nsec prefix, got {hrp}")));
            }
            data
        } else {
            hex::decode(value).map_err(|e| AppError::key(format!("invalid hex key: {e}")))?
        };

        if bytes.len() != 32 {
            return Err(AppError::key(format!(
                "secret key must be 32 bytes, got {}",
                bytes.len()
            )));
        }

        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, &bytes).map_err(AppError::key)?;
        Ok(Self { secp, keypair })
    }

    /// X-only public key.
    pub fn public_key(&self) -> XOnlyPublicKey {
        self.keypair.x_only_public_key().0
    }

    /// Public key as lowercase hex, as used in event `pubkey` fields.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key().serialize())
    }

    /// BIP-340 signature over a 32-byte digest.
    pub fn sign(&self, digest: [u8; 32]) -> schnorr::Signature {
        let message = Message::from_digest(digest);
        self.secp.sign_schnorr_no_aux_rand(&message, &self.keypair)
    }

    /// Check a signature against this key's public half.
    pub fn verify(&self, digest: [u8; 32], signature: &schnorr::Signature) -> bool {
        let message = Message::from_digest(digest);
        self.secp
            .verify_schnorr(signature, &message, &self.public_key())
            .is_ok()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bech32::{Bech32, Hrp};

    // Secret key 1: public key is the generator's x coordinate.
    const ONE_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const GENERATOR_X: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_parse_hex() {
        let key = SigningKey::parse(ONE_HEX).unwrap();
        assert_eq!(key.public_key_hex(), GENERATOR_X);
    }

    #[test]
    fn test_parse_nsec() {
        let bytes = hex::decode(ONE_HEX).unwrap();
        let nsec = bech32::encode::<Bech32>(Hrp::parse("nsec").unwrap(), &bytes).unwrap();
        assert!(nsec.starts_with("nsec1"));

        let key = SigningKey::parse(&nsec).unwrap();
        assert_eq!(key.public_key_hex(), GENERATOR_X);
    }

    #[test]
    fn test_rejects_npub() {
        let bytes = hex::decode(GENERATOR_X).unwrap();
        let npub = bech32::encode::<Bech32>(Hrp::parse("npub").unwrap(), &bytes).unwrap();
        assert!(SigningKey::parse(&npub).is_err());
    }

    #[test]
    fn test_rejects_bad_material() {
        assert!(SigningKey::parse("not a key").is_err());
        assert!(SigningKey::parse("abcd").is_err());
        assert!(SigningKey::parse(&"0".repeat(64)).is_err());
        assert!(SigningKey::parse("nsec1qqqq").is_err());
    }

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKey::parse(&"11".repeat(32)).unwrap();
        let digest = [7u8; 32];
        let signature = key.sign(digest);
        assert!(key.verify(digest, &signature));
        assert!(!key.verify([8u8; 32], &signature));
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = SigningKey::parse(&"11".repeat(32)).unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains(&"11".repeat(32)));
        assert!(debug.contains(&key.public_key_hex()));
    }
}
