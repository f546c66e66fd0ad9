//! Key-custody collaborator interface
//!
//! The engine treats signing as an opaque operation: hand over a 32-byte
//! digest, get back a recoverable signature. The only digests ever passed
//! in are commitments produced by the digest engine.

use crate::codec::address_from_key;
use crate::types::Signature;
use crate::{Error, Result};
use alloy_primitives::Address;
use k256::ecdsa::SigningKey;
use zeroize::Zeroizing;

/// Opaque signer returning a recoverable signature for a digest.
///
/// Implementations must never be asked to sign anything other than a
/// commitment produced by the digest engine.
pub trait DigestSigner: Send + Sync {
    /// The signer's on-chain identity
    fn address(&self) -> Address;

    /// Sign the raw digest bytes
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature>;
}

/// Local secp256k1 signer for single-signer setups and tests
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    /// Construct from raw 32-byte key material
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let material = Zeroizing::new(*bytes);
        let key = SigningKey::from_slice(material.as_ref())
            .map_err(|e| Error::Crypto(format!("invalid signing key: {}", e)))?;
        let address = address_from_key(key.verifying_key());
        Ok(Self { key, address })
    }

    /// Construct from a hex-encoded key string
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = Zeroizing::new(hex::decode(s)?);
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Encoding("signing key must be 32 bytes".into()))?;
        Self::from_bytes(&arr)
    }

    /// Generate a fresh random signer
    pub fn random() -> Self {
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let address = address_from_key(key.verifying_key());
        Self { key, address }
    }
}

impl DigestSigner for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature> {
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest)
            .map_err(|e| Error::Crypto(format!("signing failed: {}", e)))?;
        let r: [u8; 32] = sig.r().to_bytes().into();
        let s: [u8; 32] = sig.s().to_bytes().into();
        Ok(Signature::new(r, s, recovery_id.to_byte()))
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
