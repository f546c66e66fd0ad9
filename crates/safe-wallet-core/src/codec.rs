//! Signature encoding and recovery
//!
//! Converts raw recoverable signatures into the on-chain-accepted 65-byte
//! encoding. The offset convention adds a fixed constant to the recovery
//! byte to mark "this signature was produced over the raw digest bytes",
//! distinguishing it from the human-message-prefixing convention. The
//! engine always emits the offset encoding for commitments it signs
//! directly; the verifying contract rejects mixed encodings on its own.

use crate::digest::keccak256;
use crate::types::Signature;
use crate::{Error, Result};
use alloy_primitives::Address;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};

/// Fixed recovery-byte increment marking digest-only signing
pub const ETH_SIGN_V_OFFSET: u8 = 4;

/// Expected signature length: `r || s || v`
pub const SIGNATURE_LEN: usize = 65;

impl Signature {
    /// Parse a 65-byte `r || s || v` signature.
    ///
    /// Accepts recovery bytes in raw form (27/28), offset form (31/32),
    /// or as a bare recovery id (0/1).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(Error::Encoding(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);

        let recovery_id = match bytes[64] {
            v @ 0..=1 => v,
            v @ 27..=28 => v - 27,
            v @ 31..=32 => v - 27 - ETH_SIGN_V_OFFSET,
            v => {
                return Err(Error::Encoding(format!(
                    "unsupported recovery byte {}",
                    v
                )));
            }
        };
        Ok(Self { r, s, recovery_id })
    }

    /// Encode in the offset convention: `v = recovery_id + 27 + 4`.
    ///
    /// This is the only encoding the engine emits for commitments it
    /// signs directly.
    pub fn to_offset_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.recovery_id + 27 + ETH_SIGN_V_OFFSET;
        out
    }

    /// Encode in the raw convention: `v = recovery_id + 27`
    pub fn to_raw_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.recovery_id + 27;
        out
    }
}

/// Derive the 20-byte identity from an uncompressed public key
pub fn address_from_key(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Recover the signer identity from a signature over a raw digest.
///
/// Both raw and offset encodings recover over the digest bytes directly;
/// the offset only marks which convention produced the signature.
pub fn recover_signer(digest: &[u8; 32], signature: &Signature) -> Result<Address> {
    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&signature.r);
    sig_bytes[32..].copy_from_slice(&signature.s);

    let sig = EcdsaSignature::from_slice(&sig_bytes)
        .map_err(|e| Error::Crypto(format!("invalid scalar components: {}", e)))?;
    let recovery_id = RecoveryId::try_from(signature.recovery_id)
        .map_err(|e| Error::Crypto(format!("invalid recovery id: {}", e)))?;

    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|e| Error::VerificationFailed(format!("recovery failed: {}", e)))?;
    Ok(address_from_key(&key))
}

/// Parse a 65-byte signature and recover its signer in one step.
///
/// Used to re-verify signatures fetched from the untrusted relay before
/// the aggregator accepts them.
pub fn recover_from_bytes(digest: &[u8; 32], bytes: &[u8]) -> Result<(Address, Signature)> {
    let signature = Signature::from_bytes(bytes)?;
    let signer = recover_signer(digest, &signature)?;
    Ok((signer, signature))
}

/// Concatenate collected signatures for on-chain verification.
///
/// The verifying contract requires signatures ordered by ascending signer
/// address, which also makes the encoding deterministic regardless of
/// collection order.
pub fn signature_blob(pairs: &[(Address, Signature)]) -> Vec<u8> {
    let mut sorted: Vec<&(Address, Signature)> = pairs.iter().collect();
    sorted.sort_by_key(|(signer, _)| *signer);

    let mut blob = Vec::with_capacity(sorted.len() * SIGNATURE_LEN);
    for (_, signature) in sorted {
        blob.extend_from_slice(&signature.to_offset_bytes());
    }
    blob
}
