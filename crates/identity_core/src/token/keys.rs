//! RSA key material for token signing.
//!
//! Only the private key is configured; the verification key is always derived
//! from it, so a mismatched public key cannot be deployed.

use crate::config::KeySource;
use crate::error::{TokenError, TokenResult};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt::{Debug, Formatter};
use std::path::Path;

/// Signing key plus the verification key derived from it.
#[derive(Clone)]
pub struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    public_pem: String,
}

impl KeyPair {
    /// Parses a PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`) PEM.
    pub fn from_private_pem(pem: &str) -> TokenResult<Self> {
        let private = parse_private_key(pem)?;
        let public_pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|err| TokenError::KeyMaterial(format!("cannot encode public key: {err}")))?;

        let encoding = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|err| TokenError::KeyMaterial(format!("unusable signing key: {err}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|err| TokenError::KeyMaterial(format!("unusable verification key: {err}")))?;

        Ok(Self {
            encoding,
            decoding,
            public_pem,
        })
    }

    pub fn from_pem_file(path: &Path) -> TokenResult<Self> {
        let pem = std::fs::read_to_string(path).map_err(|err| {
            TokenError::KeyMaterial(format!("cannot read `{}`: {err}", path.display()))
        })?;
        Self::from_private_pem(&pem)
    }

    pub fn from_source(source: &KeySource) -> TokenResult<Self> {
        match source {
            KeySource::Pem(pem) => Self::from_private_pem(pem),
            KeySource::File(path) => Self::from_pem_file(path),
        }
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    /// SPKI PEM of the derived public key.
    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }
}

impl Debug for KeyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private", &"<redacted>")
            .field("public_pem_len", &self.public_pem.len())
            .finish()
    }
}

fn parse_private_key(pem: &str) -> TokenResult<RsaPrivateKey> {
    let pem = pem.trim();
    if pem.is_empty() {
        return Err(TokenError::KeyMaterial("private key is empty".to_string()));
    }
    RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|err| TokenError::KeyMaterial(format!("not an RSA private key PEM: {err}")))
}
