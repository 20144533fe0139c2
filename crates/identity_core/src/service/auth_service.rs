//! Account sign-up, login and token refresh.
//!
//! # Responsibility
//! - Combine the user repository and token manager into auth use cases.
//!
//! # Invariants
//! - Withdrawn accounts never receive tokens.
//! - Credentials are compared as already-derived values; hashing happens
//!   before this layer.

use crate::config::Settings;
use crate::db::SessionManager;
use crate::error::{AuthResult, Error, StorageError};
use crate::model::token::Token;
use crate::model::user::{LoginRequest, User};
use crate::repo::user_repo::UserRepository;
use crate::token::TokenManager;
use log::{info, warn};

/// Use-case service for authentication flows.
#[derive(Debug, Clone)]
pub struct AuthService {
    users: UserRepository,
    tokens: TokenManager,
}

impl AuthService {
    pub fn new(users: UserRepository, tokens: TokenManager) -> Self {
        Self { users, tokens }
    }

    /// Opens storage and loads key material described by `settings`.
    pub fn from_settings(settings: &Settings) -> AuthResult<Self> {
        let sessions = SessionManager::new(&settings.database)?;
        let tokens = TokenManager::new(&settings.tokens)?;
        Ok(Self::new(UserRepository::new(sessions), tokens))
    }

    /// Builds the service from `IDENTITY_*` variables, after loading `.env`.
    ///
    /// # Errors
    /// - `Config` when a variable is missing or malformed.
    pub fn from_env() -> AuthResult<Self> {
        Self::from_settings(&Settings::from_env()?)
    }

    /// [`AuthService::from_env`] over an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_settings(&Settings::from_lookup(lookup)?)
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Registers `user` and returns its first token pair.
    ///
    /// `user` is updated with the stored state.
    ///
    /// # Errors
    /// - `AlreadyExists` when the account id is taken.
    pub fn sign_up(&self, user: &mut User, credential: impl Into<String>) -> AuthResult<Token> {
        self.users.create_user(user, credential)?;
        info!(
            "event=auth_sign_up module=service status=ok account_id={}",
            user.account_id
        );
        Ok(self.tokens.issue(&user.to_user_auth())?)
    }

    /// Exchanges credentials for a token pair.
    ///
    /// # Errors
    /// - `NotFound` when no account matches id and credential together.
    /// - `Unauthorized` for withdrawn accounts.
    pub fn login(&self, request: &LoginRequest) -> AuthResult<Token> {
        let user = self
            .users
            .find_by_credentials(&request.account_id, request.password.as_deref())?
            .ok_or_else(|| {
                warn!(
                    "event=auth_login module=service status=rejected reason=no_match account_id={}",
                    request.account_id
                );
                StorageError::NotFound(format!("users '{}'", request.account_id))
            })?;
        let token = self.issue_for_active(&user)?;
        info!(
            "event=auth_login module=service status=ok account_id={}",
            user.account_id
        );
        Ok(token)
    }

    /// Exchanges a valid refresh token for a new pair, reflecting the
    /// account's current role and group.
    pub fn refresh(&self, refresh_token: &str) -> AuthResult<Token> {
        let account_id = self.tokens.verify_refresh(refresh_token)?;
        let user = self.users.get_by_id(account_id.as_str())?;
        self.issue_for_active(&user)
    }

    fn issue_for_active(&self, user: &User) -> AuthResult<Token> {
        if !user.is_active() {
            warn!(
                "event=auth_issue module=service status=rejected reason=withdrawn account_id={}",
                user.account_id
            );
            return Err(Error::Unauthorized(format!(
                "account `{}` has been withdrawn",
                user.account_id
            )));
        }
        Ok(self.tokens.issue(&user.to_user_auth())?)
    }
}
