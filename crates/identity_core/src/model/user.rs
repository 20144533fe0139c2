//! User domain model and authenticated principal view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Group assigned to newly signed-up users.
pub const DEFAULT_USER_GROUP: &str = "default";

/// Authorization role of an account.
///
/// Serialized as the upper-case storage string (`"ADMIN"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserRole {
    /// Signed up, waiting for approval.
    Pending,
    Member,
    Vip,
    DataManagement,
    Admin,
    /// Account closed by its owner; may not log in.
    Withdrawal,
    /// Stored value did not match any known role.
    Unknown,
    /// Internal auth service principal.
    Auth,
    /// Internal sidecar principal.
    Sidecar,
}

impl UserRole {
    const ALL: [UserRole; 9] = [
        Self::Pending,
        Self::Member,
        Self::Vip,
        Self::DataManagement,
        Self::Admin,
        Self::Withdrawal,
        Self::Unknown,
        Self::Auth,
        Self::Sidecar,
    ];

    /// Stable storage/wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Member => "MEMBER",
            Self::Vip => "VIP",
            Self::DataManagement => "DATA_MANAGEMENT",
            Self::Admin => "ADMIN",
            Self::Withdrawal => "WITHDRAWAL",
            Self::Unknown => "UNKNOWN",
            Self::Auth => "AUTH",
            Self::Sidecar => "SIDECAR",
        }
    }

    /// Parses a stored role case-insensitively; unmatched text is `Unknown`.
    pub fn from_text(text: &str) -> Self {
        let normalized = text.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .unwrap_or(Self::Unknown)
    }

    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

impl From<String> for UserRole {
    fn from(value: String) -> Self {
        Self::from_text(&value)
    }
}

impl From<UserRole> for String {
    fn from(value: UserRole) -> Self {
        value.as_str().to_string()
    }
}

/// Credentials submitted by a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub account_id: String,
    /// Already-derived credential; `None` never matches a stored account.
    pub password: Option<String>,
}

/// Authenticated principal; also the access token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuth {
    pub account_id: String,
    #[serde(rename = "user_role")]
    pub role: UserRole,
    #[serde(rename = "user_group")]
    pub group: String,
}

/// User account as seen by business code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub account_id: String,
    pub name: String,
    pub role: UserRole,
    pub group: String,
    pub email: String,
    pub phone: String,
    pub signup_at: DateTime<Utc>,
}

impl User {
    /// Creates a pending user in the default group, signed up now.
    pub fn new(
        account_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            name: name.into(),
            role: UserRole::Pending,
            group: DEFAULT_USER_GROUP.to_string(),
            email: email.into(),
            phone: phone.into(),
            signup_at: Utc::now(),
        }
    }

    /// Projects the principal view embedded in access tokens.
    pub fn to_user_auth(&self) -> UserAuth {
        UserAuth {
            account_id: self.account_id.clone(),
            role: self.role,
            group: self.group.clone(),
        }
    }

    /// Withdrawn accounts keep their row but may not authenticate.
    pub fn is_active(&self) -> bool {
        self.role != UserRole::Withdrawal
    }
}
