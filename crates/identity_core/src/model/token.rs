//! Token pair and token type discriminator.

use crate::error::TokenError;
use serde::{Deserialize, Serialize};

/// Signed access/refresh token pair handed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access: String,
    pub refresh: String,
}

/// Value of the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    /// Parses a `type` claim; anything else is an invalid token.
    pub fn from_text(text: &str) -> Result<Self, TokenError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            other => Err(TokenError::InvalidToken(format!(
                "unsupported token type `{other}`"
            ))),
        }
    }
}
