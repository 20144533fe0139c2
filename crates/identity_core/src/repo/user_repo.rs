//! `users` table mapping.
//!
//! # Invariants
//! - The stored credential never leaves this module through `User`.
//! - `signup_at` is persisted as RFC 3339 UTC text; unparsable values are
//!   rejected as invalid data instead of being replaced.

use super::{Fields, Key, Record, Repository};
use crate::error::{StorageError, StorageResult};
use crate::model::user::{User, UserRole, DEFAULT_USER_GROUP};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::Row;

pub type UserRepository = Repository<UserRecord>;

/// Stored shape of one account.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub account_id: String,
    pub password: Option<String>,
    pub name: Option<String>,
    pub group: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub signup_at: DateTime<Utc>,
}

impl Record for UserRecord {
    type Domain = User;
    /// Already-derived credential.
    type Material = Option<String>;

    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "account_id",
        "password",
        "username",
        "user_group",
        "user_role",
        "user_email",
        "user_phone",
        "signup_at",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["account_id"];

    fn from_domain(user: &User, password: Option<String>) -> Self {
        Self {
            account_id: user.account_id.clone(),
            password,
            name: Some(user.name.clone()),
            group: Some(user.group.clone()),
            role: Some(user.role.as_str().to_string()),
            email: Some(user.email.clone()),
            phone: Some(user.phone.clone()),
            signup_at: user.signup_at,
        }
    }

    fn to_domain(&self) -> User {
        User {
            account_id: self.account_id.clone(),
            name: self.name.clone().unwrap_or_default(),
            role: self
                .role
                .as_deref()
                .map_or(UserRole::Unknown, UserRole::from_text),
            group: self
                .group
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_GROUP.to_string()),
            email: self.email.clone().unwrap_or_default(),
            phone: self.phone.clone().unwrap_or_default(),
            signup_at: self.signup_at,
        }
    }

    // Neither the credential nor the signup time changes on profile updates.
    fn update(&mut self, user: &User) {
        self.name = Some(user.name.clone());
        self.group = Some(user.group.clone());
        self.role = Some(user.role.as_str().to_string());
        self.email = Some(user.email.clone());
        self.phone = Some(user.phone.clone());
    }

    fn primary_key(&self) -> Key {
        Key::single(&self.account_id)
    }

    fn from_row(row: &Row<'_>) -> StorageResult<Self> {
        let signup_text: String = row.get(7)?;
        let signup_at = DateTime::parse_from_rfc3339(&signup_text)
            .map_err(|_| {
                StorageError::InvalidData(format!(
                    "invalid timestamp `{signup_text}` in users.signup_at"
                ))
            })?
            .with_timezone(&Utc);

        Ok(Self {
            account_id: row.get(0)?,
            password: row.get(1)?,
            name: row.get(2)?,
            group: row.get(3)?,
            role: row.get(4)?,
            email: row.get(5)?,
            phone: row.get(6)?,
            signup_at,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.account_id.clone()),
            Value::from(self.password.clone()),
            Value::from(self.name.clone()),
            Value::from(self.group.clone()),
            Value::from(self.role.clone()),
            Value::from(self.email.clone()),
            Value::from(self.phone.clone()),
            Value::Text(self.signup_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        ]
    }
}

impl Repository<UserRecord> {
    /// Registers a new account together with its credential.
    pub fn create_user(&self, user: &mut User, credential: impl Into<String>) -> StorageResult<()> {
        self.create_with(user, Some(credential.into()))
    }

    /// Finds the account matching both id and credential.
    ///
    /// A missing credential never matches, even for accounts stored without
    /// one.
    pub fn find_by_credentials(
        &self,
        account_id: &str,
        credential: Option<&str>,
    ) -> StorageResult<Option<User>> {
        let Some(credential) = credential else {
            return Ok(None);
        };
        let criteria = Fields::new()
            .with("account_id", account_id)
            .with("password", credential);
        Ok(self.find_by(&criteria)?.into_iter().next())
    }

    /// Replaces the stored credential of one account.
    pub fn change_credential(
        &self,
        account_id: &str,
        credential: impl Into<String>,
    ) -> StorageResult<()> {
        self.update_fields(account_id, &Fields::new().with("password", credential.into()))
    }

    /// Accounts in `group`.
    pub fn find_by_group(&self, group: &str) -> StorageResult<Vec<User>> {
        self.find_by(&Fields::new().with("user_group", group))
    }
}
