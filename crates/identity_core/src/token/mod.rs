//! Token manager: RS256 access/refresh token issuance and verification.
//!
//! # Responsibility
//! - Sign access tokens carrying the principal and refresh tokens carrying
//!   only the account id.
//! - Verify signature, expiry and token type, and hand back typed claims.
//!
//! # Invariants
//! - Every token carries `type`, `iat` and `exp` claims.
//! - Expiry is checked with zero leeway.
//! - A token of one type is never accepted by the other type's verifier.
//!
//! Stateless: there is no revocation list.

mod keys;

pub use keys::KeyPair;

use crate::config::TokenConfig;
use crate::error::{TokenError, TokenResult};
use crate::model::token::{Token, TokenType};
use crate::model::user::UserAuth;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, EncodingKey, Header, Validation};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const TOKEN_ALGORITHM: Algorithm = Algorithm::RS256;

/// Verified access token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(flatten)]
    pub principal: UserAuth,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

/// Verified refresh token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub account_id: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Serialize)]
struct RefreshPayload<'a> {
    account_id: &'a str,
}

#[derive(Serialize)]
struct Claims<'a, P: Serialize> {
    #[serde(flatten)]
    payload: &'a P,
    #[serde(rename = "type")]
    token_type: TokenType,
    iat: i64,
    exp: i64,
}

/// Signs `payload` with the reserved `type`, `iat` and `exp` claims added.
///
/// `lifetime` is in seconds and may be negative. Payload fields named like a
/// reserved claim produce an ambiguous token and must be avoided.
pub fn encode_token<P: Serialize>(
    payload: &P,
    token_type: TokenType,
    key: &EncodingKey,
    lifetime: i64,
) -> TokenResult<String> {
    let iat = Utc::now().timestamp();
    let claims = Claims {
        payload,
        token_type,
        iat,
        exp: iat.saturating_add(lifetime),
    };
    encode(&Header::new(TOKEN_ALGORITHM), &claims, key).map_err(TokenError::Signing)
}

/// Issues and verifies token pairs with one RSA key pair.
///
/// Cloning shares the parsed key material.
#[derive(Debug, Clone)]
pub struct TokenManager {
    keys: Arc<KeyPair>,
    access_lifetime: i64,
    refresh_lifetime: i64,
}

impl TokenManager {
    pub fn new(config: &TokenConfig) -> TokenResult<Self> {
        Ok(Self {
            keys: Arc::new(KeyPair::from_source(&config.private_key)?),
            access_lifetime: config.access_token_lifetime,
            refresh_lifetime: config.refresh_token_lifetime,
        })
    }

    /// Builds a manager from an in-memory private key PEM. Lifetimes are in
    /// seconds.
    pub fn from_private_pem(
        pem: &str,
        access_lifetime: i64,
        refresh_lifetime: i64,
    ) -> TokenResult<Self> {
        Ok(Self {
            keys: Arc::new(KeyPair::from_private_pem(pem)?),
            access_lifetime,
            refresh_lifetime,
        })
    }

    /// Issues an access token for `principal` and a refresh token for its
    /// account id.
    pub fn issue(&self, principal: &UserAuth) -> TokenResult<Token> {
        let access = encode_token(
            principal,
            TokenType::Access,
            self.keys.encoding_key(),
            self.access_lifetime,
        )?;
        let refresh = encode_token(
            &RefreshPayload {
                account_id: &principal.account_id,
            },
            TokenType::Refresh,
            self.keys.encoding_key(),
            self.refresh_lifetime,
        )?;
        debug!(
            "event=token_issue module=token status=ok account_id={} role={}",
            principal.account_id,
            principal.role.as_str()
        );
        Ok(Token { access, refresh })
    }

    /// Verifies an access token and returns its claims.
    ///
    /// # Errors
    /// - `ExpiredToken` when `exp` has passed.
    /// - `InvalidToken` for bad signatures, malformed tokens, refresh tokens
    ///   and missing principal fields.
    pub fn verify_access(&self, token: &str) -> TokenResult<AccessClaims> {
        self.verify(token, TokenType::Access)
    }

    /// Verifies a refresh token and returns the account id it was issued for.
    pub fn verify_refresh(&self, token: &str) -> TokenResult<String> {
        let claims: RefreshClaims = self.verify(token, TokenType::Refresh)?;
        Ok(claims.account_id)
    }

    pub fn public_key_pem(&self) -> &str {
        self.keys.public_key_pem()
    }

    pub fn access_lifetime(&self) -> i64 {
        self.access_lifetime
    }

    pub fn refresh_lifetime(&self) -> i64 {
        self.refresh_lifetime
    }

    fn verify<C: DeserializeOwned>(&self, token: &str, expected: TokenType) -> TokenResult<C> {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;

        let data = decode::<serde_json::Value>(token, self.keys.decoding_key(), &validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::ExpiredToken,
                _ => TokenError::InvalidToken(err.to_string()),
            })?;

        let actual = data
            .claims
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| TokenError::InvalidToken("missing `type` claim".to_string()))
            .and_then(TokenType::from_text)?;
        if actual != expected {
            debug!(
                "event=token_verify module=token status=rejected expected={} actual={}",
                expected.as_str(),
                actual.as_str()
            );
            return Err(TokenError::InvalidToken(format!(
                "expected {} token, got {}",
                expected.as_str(),
                actual.as_str()
            )));
        }

        serde_json::from_value(data.claims)
            .map_err(|err| TokenError::InvalidToken(format!("unexpected claims: {err}")))
    }
}
