use identity_core::config::{
    ENV_DATABASE_PATH, ENV_DATABASE_POOL_SIZE, ENV_TOKEN_PRIVATE_KEY, ENV_TOKEN_PRIVATE_KEY_PATH,
};
use identity_core::{
    AuthService, ConfigError, DatabaseConfig, Error, KeySource, LoggingConfig, LoginRequest,
    SessionManager, Settings, StorageError, TokenConfig, TokenError, TokenManager, User,
    UserRepository, UserRole,
};
use std::collections::HashMap;

const SIGNING_PEM: &str = include_str!("fixtures/signing_key.pem");

fn service() -> AuthService {
    let users = UserRepository::new(SessionManager::open_in_memory().unwrap());
    let tokens = TokenManager::from_private_pem(SIGNING_PEM, 300, 3_600).unwrap();
    AuthService::new(users, tokens)
}

fn login(account_id: &str, password: Option<&str>) -> LoginRequest {
    LoginRequest {
        account_id: account_id.to_string(),
        password: password.map(str::to_string),
    }
}

fn signed_up(service: &AuthService) -> User {
    let mut user = User::new("paicm", "Chaemin", "paicm@example.com", "010-1234-1234");
    service.sign_up(&mut user, "hashed-secret").unwrap();
    user
}

#[test]
fn sign_up_stores_user_and_issues_tokens() {
    let service = service();
    let mut user = User::new("paicm", "Chaemin", "paicm@example.com", "010-1234-1234");
    let token = service.sign_up(&mut user, "hashed-secret").unwrap();

    let claims = service.tokens().verify_access(&token.access).unwrap();
    assert_eq!(claims.principal, user.to_user_auth());
    assert_eq!(claims.principal.role, UserRole::Pending);
    assert_eq!(service.users().get_by_id("paicm").unwrap(), user);
}

#[test]
fn duplicate_sign_up_is_already_exists() {
    let service = service();
    signed_up(&service);

    let mut again = User::new("paicm", "Other", "other@example.com", "010-0000-0000");
    let err = service.sign_up(&mut again, "other").unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::AlreadyExists(_))));
}

#[test]
fn login_issues_tokens_for_matching_credentials() {
    let service = service();
    signed_up(&service);

    let token = service.login(&login("paicm", Some("hashed-secret"))).unwrap();
    assert_eq!(service.tokens().verify_refresh(&token.refresh).unwrap(), "paicm");
}

#[test]
fn login_with_wrong_or_missing_credentials_is_not_found() {
    let service = service();
    signed_up(&service);

    for request in [
        login("paicm", Some("wrong")),
        login("paicm", None),
        login("nobody", Some("hashed-secret")),
    ] {
        let err = service.login(&request).unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::NotFound(_))));
    }
}

#[test]
fn withdrawn_account_cannot_login_or_refresh() {
    let service = service();
    let mut user = signed_up(&service);
    let before = service.login(&login("paicm", Some("hashed-secret"))).unwrap();

    user.role = UserRole::Withdrawal;
    service.users().update(&mut user).unwrap();

    assert!(matches!(
        service.login(&login("paicm", Some("hashed-secret"))),
        Err(Error::Unauthorized(_))
    ));
    assert!(matches!(
        service.refresh(&before.refresh),
        Err(Error::Unauthorized(_))
    ));
}

#[test]
fn refresh_reflects_current_role() {
    let service = service();
    let mut user = signed_up(&service);
    let first = service.login(&login("paicm", Some("hashed-secret"))).unwrap();

    user.role = UserRole::Member;
    service.users().save(&mut user).unwrap();

    let renewed = service.refresh(&first.refresh).unwrap();
    let claims = service.tokens().verify_access(&renewed.access).unwrap();
    assert_eq!(claims.principal.role, UserRole::Member);
}

#[test]
fn refresh_rejects_access_tokens_and_deleted_accounts() {
    let service = service();
    signed_up(&service);
    let token = service.login(&login("paicm", Some("hashed-secret"))).unwrap();

    assert!(matches!(
        service.refresh(&token.access),
        Err(Error::Token(TokenError::InvalidToken(_)))
    ));

    service.users().delete("paicm").unwrap();
    assert!(matches!(
        service.refresh(&token.refresh),
        Err(Error::Storage(StorageError::NotFound(_)))
    ));
}

#[test]
fn service_is_built_from_settings() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        database: DatabaseConfig::file(dir.path().join("identity.db")),
        tokens: TokenConfig::new(KeySource::Pem(SIGNING_PEM.to_string())),
        logging: LoggingConfig::default(),
    };

    let service = AuthService::from_settings(&settings).unwrap();
    signed_up(&service);
    assert!(service.login(&login("paicm", Some("hashed-secret"))).is_ok());
}

#[test]
fn bad_key_material_in_settings_is_a_token_error() {
    let settings = Settings {
        database: DatabaseConfig::in_memory(),
        tokens: TokenConfig::new(KeySource::Pem("garbage".to_string())),
        logging: LoggingConfig::default(),
    };

    assert!(matches!(
        AuthService::from_settings(&settings),
        Err(Error::Token(TokenError::KeyMaterial(_)))
    ));
}

#[test]
fn service_is_built_from_variables() {
    let vars = HashMap::from([
        (ENV_DATABASE_PATH, ":memory:"),
        (ENV_TOKEN_PRIVATE_KEY, SIGNING_PEM),
    ]);
    let lookup = |name: &str| vars.get(name).map(|value| value.to_string());

    let service = AuthService::from_lookup(lookup).unwrap();
    signed_up(&service);
    assert!(service.login(&login("paicm", Some("hashed-secret"))).is_ok());
}

#[test]
fn missing_key_variable_is_a_config_error() {
    let vars = HashMap::from([(ENV_DATABASE_PATH, ":memory:")]);
    let lookup = |name: &str| vars.get(name).map(|value| value.to_string());

    assert!(matches!(
        AuthService::from_lookup(lookup),
        Err(Error::Config(ConfigError::Missing(name))) if name == ENV_TOKEN_PRIVATE_KEY_PATH
    ));
}

#[test]
fn malformed_variable_is_a_config_error() {
    let vars = HashMap::from([
        (ENV_DATABASE_PATH, ":memory:"),
        (ENV_DATABASE_POOL_SIZE, "many"),
        (ENV_TOKEN_PRIVATE_KEY, SIGNING_PEM),
    ]);
    let lookup = |name: &str| vars.get(name).map(|value| value.to_string());

    assert!(matches!(
        AuthService::from_lookup(lookup),
        Err(Error::Config(ConfigError::Invalid { name, .. })) if name == ENV_DATABASE_POOL_SIZE
    ));
}
