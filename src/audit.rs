use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{LoanError, Result};

/// Stamps mutations with a timestamp signed by the process identity.
///
/// There is exactly one signing key per signer; hand it in explicitly so tests
/// can use a fixed key.
pub struct AuditSigner {
    signing_key: SigningKey,
}

/// Signed timestamp travelling with a persisted record.
///
/// The seal is the signer's public key followed by the ed25519 signature over the
/// decimal text of `timestamp`, so it can be verified on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// unix seconds
    pub timestamp: i64,
    #[serde(serialize_with = "seal_to_base64", deserialize_with = "seal_from_base64")]
    pub seal: Vec<u8>,
}

impl AuditSigner {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// signer with a fresh random key
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// deterministic signer from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::new(SigningKey::from_bytes(seed))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// attest the current instant
    pub fn stamp(&self, time: &SafeTimeProvider) -> Attestation {
        self.stamp_at(time.now())
    }

    pub fn stamp_at(&self, at: DateTime<Utc>) -> Attestation {
        let timestamp = at.timestamp();
        let signature = self.signing_key.sign(timestamp.to_string().as_bytes());

        let mut seal = Vec::with_capacity(PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH);
        seal.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        seal.extend_from_slice(&signature.to_bytes());

        Attestation { timestamp, seal }
    }

    /// verify an attestation was produced by this signer
    pub fn verify(&self, attestation: &Attestation) -> Result<()> {
        attestation.verify_with(&self.verifying_key())
    }
}

impl Attestation {
    pub fn at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }

    fn split_seal(&self) -> Result<(VerifyingKey, Signature)> {
        if self.seal.len() != PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH {
            return Err(LoanError::InvalidSignature {
                message: format!("seal length {}", self.seal.len()),
            });
        }
        let (pk, sig) = self.seal.split_at(PUBLIC_KEY_LENGTH);

        let pk: [u8; PUBLIC_KEY_LENGTH] = pk.try_into().map_err(|_| LoanError::InvalidSignature {
            message: "malformed public key".to_string(),
        })?;
        let sig: [u8; SIGNATURE_LENGTH] = sig.try_into().map_err(|_| LoanError::InvalidSignature {
            message: "malformed signature".to_string(),
        })?;

        let key = VerifyingKey::from_bytes(&pk).map_err(|e| LoanError::InvalidSignature {
            message: e.to_string(),
        })?;
        Ok((key, Signature::from_bytes(&sig)))
    }

    /// verify against the public key embedded in the seal
    pub fn verify(&self) -> Result<()> {
        let (key, signature) = self.split_seal()?;
        Self::check(&key, self.timestamp, &signature)
    }

    /// verify against an expected public key
    pub fn verify_with(&self, expected: &VerifyingKey) -> Result<()> {
        let (key, signature) = self.split_seal()?;
        if key != *expected {
            return Err(LoanError::InvalidSignature {
                message: "attestation signed by a different key".to_string(),
            });
        }
        Self::check(&key, self.timestamp, &signature)
    }

    fn check(key: &VerifyingKey, timestamp: i64, signature: &Signature) -> Result<()> {
        key.verify(timestamp.to_string().as_bytes(), signature)
            .map_err(|e| LoanError::InvalidSignature {
                message: e.to_string(),
            })
    }
}

fn seal_to_base64<S: Serializer>(seal: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(seal))
}

fn seal_from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    STANDARD.decode(s).map_err(serde::de::Error::custom)
}
