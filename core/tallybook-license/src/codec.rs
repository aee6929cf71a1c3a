//! License token signing and Ed25519 signature verification.
//!
//! Tokens use the format: `base64url(payload).base64url(signature)`
//!
//! The payload is the [`LicenseClaim`] as compact JSON in struct field order:
//! - `company`, `email`: license holder
//! - `iat`, `exp`: issued-at and expiry (seconds since epoch)
//! - `max_users`, `class`: entitlement limits
//!
//! The signature covers `payload_b64.as_bytes()` (the base64url-encoded
//! payload string, not the decoded JSON).
//!
//! The codec checks integrity only. Whether a decoded claim is still in
//! force is the entitlement service's decision.

use crate::claim::LicenseClaim;
use crate::error::{DecodeError, LicenseError, LicenseResult};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{SIGNATURE_LENGTH, Signature, Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use std::fmt;

/// Encodes and decodes signed license tokens.
#[derive(Clone)]
pub struct LicenseCodec {
    signing_key: Option<SigningKey>,
    verifying_key: VerifyingKey,
}

impl LicenseCodec {
    /// Creates a codec that can both issue and verify tokens.
    #[must_use]
    pub fn new(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key: Some(signing_key),
            verifying_key,
        }
    }

    /// Creates a signing codec from a 32-byte Ed25519 seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::new(SigningKey::from_bytes(seed))
    }

    /// Creates a verify-only codec from raw public key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidKey`] if the bytes are not a valid
    /// Ed25519 point.
    pub fn verifier(pub_key_bytes: &[u8; 32]) -> LicenseResult<Self> {
        let verifying_key = VerifyingKey::from_bytes(pub_key_bytes)
            .map_err(|_| LicenseError::InvalidKey("invalid public key".to_string()))?;
        Ok(Self {
            signing_key: None,
            verifying_key,
        })
    }

    /// Returns true if this codec can issue tokens.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        self.signing_key.is_some()
    }

    /// Returns the raw verifying key bytes.
    #[must_use]
    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Short fingerprint of the verifying key, for logs and health output.
    ///
    /// Changes whenever the signing key is rotated.
    #[must_use]
    pub fn key_id(&self) -> String {
        let digest = Sha256::digest(self.verifying_key.as_bytes());
        hex::encode(&digest[..8])
    }

    /// Serializes and signs a claim.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::SigningUnavailable`] for a verify-only codec and
    /// [`LicenseError::InvalidClaim`] if the claim does not expire after it
    /// was issued.
    pub fn encode(&self, claim: &LicenseClaim) -> LicenseResult<String> {
        let signing_key = self
            .signing_key
            .as_ref()
            .ok_or(LicenseError::SigningUnavailable)?;
        if !outlives_issuance(claim) {
            return Err(LicenseError::InvalidClaim(EXPIRY_BEFORE_ISSUANCE.to_string()));
        }

        let payload_json = serde_json::to_vec(claim)?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);
        let signature = signing_key.sign(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

        Ok(format!("{payload_b64}.{sig_b64}"))
    }

    /// Verifies a token and returns its claim. Expiry is not checked.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] for structurally invalid input and
    /// [`DecodeError::BadSignature`] when the signature does not verify.
    pub fn decode(&self, token: &str) -> Result<LicenseClaim, DecodeError> {
        let token = token.trim();

        let (payload_b64, signature_b64) = match token.split_once('.') {
            Some((p, s)) if !p.is_empty() && !s.contains('.') => (p, s),
            _ => {
                return Err(DecodeError::Malformed(
                    "token must have exactly two parts separated by a dot".to_string(),
                ));
            }
        };

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| DecodeError::Malformed(format!("invalid signature base64: {e}")))?;

        if sig_bytes.len() != SIGNATURE_LENGTH {
            return Err(DecodeError::Malformed(format!(
                "invalid signature length: {}",
                sig_bytes.len()
            )));
        }
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|_| DecodeError::Malformed("invalid signature encoding".to_string()))?;

        // Verify over the encoded payload text before touching its contents.
        self.verifying_key
            .verify_strict(payload_b64.as_bytes(), &signature)
            .map_err(|_| DecodeError::BadSignature)?;

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| DecodeError::Malformed(format!("invalid payload base64: {e}")))?;

        let claim: LicenseClaim = serde_json::from_slice(&payload_json)
            .map_err(|e| DecodeError::Malformed(format!("invalid payload JSON: {e}")))?;

        if !outlives_issuance(&claim) {
            return Err(DecodeError::Malformed(EXPIRY_BEFORE_ISSUANCE.to_string()));
        }

        Ok(claim)
    }
}

impl fmt::Debug for LicenseCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseCodec")
            .field("key_id", &self.key_id())
            .field("signing_key", &self.signing_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

const EXPIRY_BEFORE_ISSUANCE: &str = "expiry must be after issuance";

fn outlives_issuance(claim: &LicenseClaim) -> bool {
    claim.expires_at > claim.issued_at
}
