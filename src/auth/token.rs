// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PASETO v2 token issuance and verification.
//!
//! ## Schemes
//!
//! - `Encrypted` (`v2.local`): XChaCha20-Poly1305 under a 32-byte shared key.
//!   Payloads are confidential and tamper-evident.
//! - `Signed` (`v2.public`): Ed25519. Payloads are readable by anyone holding
//!   the token but cannot be altered without the private key.
//!
//! The scheme is fixed when the service is built. Expiry is the only
//! revocation mechanism: nothing is stored server-side.

use std::fmt;

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{Ed25519KeyPair, KeyPair};
use rusty_paseto::core::{
    Key, Local, Paseto, PasetoAsymmetricPrivateKey, PasetoAsymmetricPublicKey, PasetoNonce,
    PasetoSymmetricKey, Payload, Public, V2,
};
use thiserror::Error;

use super::claims::{AccessLevel, TokenPayload};
use crate::config::{ConfigError, TokenConfig, TOKEN_SIGNING_KEY_ENV, TOKEN_SYMMETRIC_KEY_ENV};

/// Required length of the `v2.local` key (XChaCha20-Poly1305).
pub const SYMMETRIC_KEY_LEN: usize = 32;
/// Length of an Ed25519 seed.
pub const SIGNING_SEED_LEN: usize = 32;
/// Length of an Ed25519 keypair (seed followed by public key).
pub const SIGNING_KEYPAIR_LEN: usize = 64;
/// Length of an Ed25519 public key.
pub const VERIFYING_KEY_LEN: usize = 32;

const NONCE_LEN: usize = 24;

/// How tokens are protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScheme {
    /// Asymmetric signature (`v2.public`)
    Signed,
    /// Symmetric authenticated encryption (`v2.local`)
    Encrypted,
}

impl TokenScheme {
    /// Version and purpose prefix of tokens produced under this scheme.
    pub fn header(&self) -> &'static str {
        match self {
            TokenScheme::Signed => "v2.public.",
            TokenScheme::Encrypted => "v2.local.",
        }
    }
}

/// Malformed key material or token settings. Raised while building the
/// service, i.e. at startup.
#[derive(Debug, Error)]
pub enum KeyConfigError {
    #[error("symmetric key must be exactly {SYMMETRIC_KEY_LEN} bytes, got {0}")]
    SymmetricKeyLength(usize),
    #[error("signing key must be a {SIGNING_SEED_LEN}-byte seed or a {SIGNING_KEYPAIR_LEN}-byte keypair, got {0} bytes")]
    SigningKeyLength(usize),
    #[error("verifying key must be {VERIFYING_KEY_LEN} bytes, got {0}")]
    VerifyingKeyLength(usize),
    #[error("key material is not valid base64")]
    Encoding,
    #[error("signing key is not a valid Ed25519 key")]
    InvalidSigningKey,
    #[error("verifying key does not belong to the signing key")]
    KeyPairMismatch,
    #[error("token ttl must be at least one second, got {0}s")]
    NonPositiveTtl(i64),
    #[error("secure random number generator unavailable")]
    Entropy,
    #[error("token protection failed: {0}")]
    Protect(String),
}

/// Token issuance and verification failures.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    KeyConfig(#[from] KeyConfigError),
    /// Bad signature or MAC, wrong header, truncated or otherwise malformed
    #[error("token is invalid")]
    InvalidToken,
    #[error("token has expired")]
    Expired,
}

/// Ed25519 keypair for the `Signed` scheme.
#[derive(Clone)]
pub struct SigningKeys {
    keypair: [u8; SIGNING_KEYPAIR_LEN],
    verifying: [u8; VERIFYING_KEY_LEN],
}

impl SigningKeys {
    /// Derive the keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyConfigError> {
        if seed.len() != SIGNING_SEED_LEN {
            return Err(KeyConfigError::SigningKeyLength(seed.len()));
        }
        let pair = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|_| KeyConfigError::InvalidSigningKey)?;
        Ok(Self::assemble(seed, pair.public_key().as_ref()))
    }

    /// Accept either a seed or a full keypair. When `verifying` is given it
    /// must be the public half of `signing`.
    pub fn from_bytes(signing: &[u8], verifying: Option<&[u8]>) -> Result<Self, KeyConfigError> {
        let keys = match signing.len() {
            SIGNING_SEED_LEN => Self::from_seed(signing)?,
            SIGNING_KEYPAIR_LEN => {
                let (seed, public) = signing.split_at(SIGNING_SEED_LEN);
                Ed25519KeyPair::from_seed_and_public_key(seed, public)
                    .map_err(|_| KeyConfigError::KeyPairMismatch)?;
                Self::assemble(seed, public)
            }
            other => return Err(KeyConfigError::SigningKeyLength(other)),
        };

        if let Some(verifying) = verifying {
            if verifying.len() != VERIFYING_KEY_LEN {
                return Err(KeyConfigError::VerifyingKeyLength(verifying.len()));
            }
            if verifying != keys.verifying.as_slice() {
                return Err(KeyConfigError::KeyPairMismatch);
            }
        }
        Ok(keys)
    }

    /// Same as [`SigningKeys::from_bytes`] with standard base64 input.
    pub fn from_base64(signing: &str, verifying: Option<&str>) -> Result<Self, KeyConfigError> {
        let signing = Base64::decode_vec(signing.trim()).map_err(|_| KeyConfigError::Encoding)?;
        let verifying = verifying
            .map(|v| Base64::decode_vec(v.trim()).map_err(|_| KeyConfigError::Encoding))
            .transpose()?;
        Self::from_bytes(&signing, verifying.as_deref())
    }

    pub fn verifying_key(&self) -> &[u8; VERIFYING_KEY_LEN] {
        &self.verifying
    }

    fn assemble(seed: &[u8], public: &[u8]) -> Self {
        let mut keypair = [0u8; SIGNING_KEYPAIR_LEN];
        keypair[..SIGNING_SEED_LEN].copy_from_slice(seed);
        keypair[SIGNING_SEED_LEN..].copy_from_slice(public);
        let mut verifying = [0u8; VERIFYING_KEY_LEN];
        verifying.copy_from_slice(public);
        Self { keypair, verifying }
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("verifying", &Base64::encode_string(&self.verifying))
            .finish_non_exhaustive()
    }
}

enum Protector {
    Signed(SigningKeys),
    Encrypted([u8; SYMMETRIC_KEY_LEN]),
}

/// Issues and verifies bearer tokens.
///
/// Immutable after construction, so it can be shared across request tasks
/// behind an `Arc` without locking.
pub struct TokenService {
    protector: Protector,
    ttl: Duration,
    rng: SystemRandom,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("scheme", &self.scheme())
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// `v2.local` service. The key is used byte-for-byte.
    pub fn encrypted(symmetric_key: &[u8], ttl: Duration) -> Result<Self, KeyConfigError> {
        let key: [u8; SYMMETRIC_KEY_LEN] = symmetric_key
            .try_into()
            .map_err(|_| KeyConfigError::SymmetricKeyLength(symmetric_key.len()))?;
        Self::build(Protector::Encrypted(key), ttl)
    }

    /// `v2.public` service.
    pub fn signed(keys: SigningKeys, ttl: Duration) -> Result<Self, KeyConfigError> {
        Self::build(Protector::Signed(keys), ttl)
    }

    /// Build the service for `scheme` from environment-sourced settings.
    pub fn from_config(scheme: TokenScheme, config: &TokenConfig) -> Result<Self, ConfigError> {
        let service = match scheme {
            TokenScheme::Encrypted => {
                let key = config
                    .symmetric_key
                    .as_deref()
                    .ok_or(ConfigError::Missing(TOKEN_SYMMETRIC_KEY_ENV))?;
                Self::encrypted(key.as_bytes(), config.ttl)?
            }
            TokenScheme::Signed => {
                let signing = config
                    .signing_key
                    .as_deref()
                    .ok_or(ConfigError::Missing(TOKEN_SIGNING_KEY_ENV))?;
                let keys = SigningKeys::from_base64(signing, config.verifying_key.as_deref())?;
                Self::signed(keys, config.ttl)?
            }
        };
        Ok(service)
    }

    fn build(protector: Protector, ttl: Duration) -> Result<Self, KeyConfigError> {
        // Whole seconds only; a sub-second TTL would expire at issuance.
        if ttl.num_seconds() < 1 {
            return Err(KeyConfigError::NonPositiveTtl(ttl.num_seconds()));
        }
        Ok(Self {
            protector,
            ttl,
            rng: SystemRandom::new(),
        })
    }

    pub fn scheme(&self) -> TokenScheme {
        match self.protector {
            Protector::Signed(_) => TokenScheme::Signed,
            Protector::Encrypted(_) => TokenScheme::Encrypted,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `payload` with the full projection.
    pub fn issue(&self, payload: TokenPayload) -> Result<String, TokenError> {
        self.issue_at(payload, AccessLevel::Full, Utc::now())
    }

    /// Issue a token protecting the projection chosen by `access`.
    pub fn issue_with_access(&self, payload: TokenPayload, access: AccessLevel) -> Result<String, TokenError> {
        self.issue_at(payload, access, Utc::now())
    }

    /// Issue as if the current time were `now`. Overwrites `issued_at` and
    /// `expired_at`.
    pub fn issue_at(
        &self,
        mut payload: TokenPayload,
        access: AccessLevel,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        payload.strip_reserved_extensions();
        payload.issued_at = now.timestamp();
        payload.expired_at = payload.issued_at + self.ttl.num_seconds();

        let message = payload
            .to_json(access)
            .map_err(|e| KeyConfigError::Protect(e.to_string()))?;
        let token = self.seal(&message)?;

        tracing::debug!(
            scheme = ?self.scheme(),
            access = ?access,
            username = %payload.username,
            role = %payload.role,
            expired_at = payload.expired_at,
            "Issued token"
        );
        Ok(token)
    }

    /// Verify `token` against the current time.
    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify as if the current time were `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenPayload, TokenError> {
        let message = self.open(token)?;
        let payload: TokenPayload =
            serde_json::from_str(&message).map_err(|_| TokenError::InvalidToken)?;

        if !payload.is_valid_at(now.timestamp()) {
            tracing::debug!(expired_at = payload.expired_at, "Rejected expired token");
            return Err(TokenError::Expired);
        }
        Ok(payload)
    }

    fn seal(&self, message: &str) -> Result<String, KeyConfigError> {
        match &self.protector {
            Protector::Encrypted(raw_key) => {
                let mut raw_nonce = [0u8; NONCE_LEN];
                self.rng
                    .fill(&mut raw_nonce)
                    .map_err(|_| KeyConfigError::Entropy)?;
                let nonce_key = Key::<NONCE_LEN>::from(raw_nonce);
                let nonce = PasetoNonce::<V2, Local>::from(&nonce_key);
                let key = PasetoSymmetricKey::<V2, Local>::from(Key::<SYMMETRIC_KEY_LEN>::from(*raw_key));

                Paseto::<V2, Local>::builder()
                    .set_payload(Payload::from(message))
                    .try_encrypt(&key, &nonce)
                    .map_err(|e| KeyConfigError::Protect(e.to_string()))
            }
            Protector::Signed(keys) => {
                let keypair = Key::<SIGNING_KEYPAIR_LEN>::from(keys.keypair);
                let private_key = PasetoAsymmetricPrivateKey::<V2, Public>::from(&keypair);

                Paseto::<V2, Public>::builder()
                    .set_payload(Payload::from(message))
                    .try_sign(&private_key)
                    .map_err(|e| KeyConfigError::Protect(e.to_string()))
            }
        }
    }

    fn open(&self, token: &str) -> Result<String, TokenError> {
        // No footer is ever issued, so a fourth segment is never legitimate.
        let Some(body) = token.strip_prefix(self.scheme().header()) else {
            return Err(TokenError::InvalidToken);
        };
        if body.is_empty() || body.contains('.') {
            return Err(TokenError::InvalidToken);
        }

        let opened = match &self.protector {
            Protector::Encrypted(raw_key) => {
                let key = PasetoSymmetricKey::<V2, Local>::from(Key::<SYMMETRIC_KEY_LEN>::from(*raw_key));
                Paseto::<V2, Local>::try_decrypt(token, &key, None)
            }
            Protector::Signed(keys) => {
                let verifying = Key::<VERIFYING_KEY_LEN>::from(keys.verifying);
                let public_key = PasetoAsymmetricPublicKey::<V2, Public>::from(&verifying);
                Paseto::<V2, Public>::try_verify(token, &public_key, None)
            }
        };

        opened.map_err(|e| {
            tracing::debug!(error = %e, "Token failed cryptographic check");
            TokenError::InvalidToken
        })
    }
}
