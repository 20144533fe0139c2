use chrono::{TimeZone, Utc};
use identity_core::{Fields, SessionManager, StorageError, User, UserRepository, UserRole};

fn repository() -> UserRepository {
    UserRepository::new(SessionManager::open_in_memory().unwrap())
}

fn chaemin() -> User {
    let mut user = User::new("paicm", "Chaemin", "paicm@example.com", "010-1234-1234");
    user.group = "paip".to_string();
    user
}

#[test]
fn created_user_round_trips() {
    let repo = repository();
    let mut user = chaemin();
    user.signup_at = Utc.with_ymd_and_hms(2023, 11, 5, 8, 0, 0).unwrap();
    repo.create_user(&mut user, "hashed-secret").unwrap();

    let stored = repo.get_by_id("paicm").unwrap();
    assert_eq!(stored, user);
    assert_eq!(stored.role, UserRole::Pending);
}

#[test]
fn sub_second_signup_time_survives_storage() {
    let repo = repository();
    let mut user = chaemin();
    let signed_up = user.signup_at;
    repo.create_user(&mut user, "hashed-secret").unwrap();

    assert_eq!(repo.get_by_id("paicm").unwrap().signup_at, signed_up);
}

#[test]
fn duplicate_account_id_is_already_exists() {
    let repo = repository();
    repo.create_user(&mut chaemin(), "first").unwrap();

    let mut again = chaemin();
    again.name = "Impostor".to_string();
    let err = repo.create_user(&mut again, "second").unwrap_err();

    assert!(matches!(err, StorageError::AlreadyExists(_)));
    assert_eq!(repo.count().unwrap(), 1);
    assert_eq!(repo.get_by_id("paicm").unwrap().name, "Chaemin");
}

#[test]
fn credentials_must_match_together() {
    let repo = repository();
    repo.create_user(&mut chaemin(), "hashed-secret").unwrap();

    let found = repo
        .find_by_credentials("paicm", Some("hashed-secret"))
        .unwrap()
        .unwrap();
    assert_eq!(found.account_id, "paicm");

    assert!(repo
        .find_by_credentials("paicm", Some("wrong"))
        .unwrap()
        .is_none());
    assert!(repo
        .find_by_credentials("nobody", Some("hashed-secret"))
        .unwrap()
        .is_none());
    assert!(repo.find_by_credentials("paicm", None).unwrap().is_none());
}

#[test]
fn account_without_credential_never_matches() {
    let repo = repository();
    let mut user = chaemin();
    repo.create(&mut user).unwrap();

    assert!(repo.find_by_credentials("paicm", None).unwrap().is_none());
    assert!(repo.find_by_credentials("paicm", Some("")).unwrap().is_none());
}

#[test]
fn save_updates_profile_and_keeps_credential() {
    let repo = repository();
    let mut user = chaemin();
    repo.create_user(&mut user, "hashed-secret").unwrap();

    user.role = UserRole::Vip;
    user.email = "new@example.com".to_string();
    repo.save(&mut user).unwrap();

    let stored = repo.get_by_id("paicm").unwrap();
    assert_eq!(stored.role, UserRole::Vip);
    assert_eq!(stored.email, "new@example.com");
    assert!(repo
        .find_by_credentials("paicm", Some("hashed-secret"))
        .unwrap()
        .is_some());
}

#[test]
fn save_keeps_original_signup_time() {
    let repo = repository();
    let mut user = chaemin();
    user.signup_at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let signed_up = user.signup_at;
    repo.create_user(&mut user, "secret").unwrap();

    let mut renamed = User::new("paicm", "Renamed", "paicm@example.com", "010-1234-1234");
    assert_ne!(renamed.signup_at, signed_up);
    repo.save(&mut renamed).unwrap();

    let stored = repo.get_by_id("paicm").unwrap();
    assert_eq!(stored.name, "Renamed");
    assert_eq!(stored.signup_at, signed_up);
    assert_eq!(renamed.signup_at, signed_up);
}

#[test]
fn change_credential_replaces_the_old_one() {
    let repo = repository();
    repo.create_user(&mut chaemin(), "old").unwrap();

    repo.change_credential("paicm", "new").unwrap();

    assert!(repo.find_by_credentials("paicm", Some("old")).unwrap().is_none());
    assert!(repo.find_by_credentials("paicm", Some("new")).unwrap().is_some());
    assert!(matches!(
        repo.change_credential("nobody", "new"),
        Err(StorageError::NotFound(_))
    ));
}

#[test]
fn account_id_cannot_be_reassigned() {
    let repo = repository();
    repo.create_user(&mut chaemin(), "secret").unwrap();

    let err = repo
        .update_fields("paicm", &Fields::new().with("account_id", "someone"))
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidColumn { .. }));
    assert!(repo.find_by_id("paicm").unwrap().is_some());
}

#[test]
fn unknown_stored_role_loads_as_unknown() {
    let repo = repository();
    repo.create_user(&mut chaemin(), "secret").unwrap();
    repo.update_fields("paicm", &Fields::new().with("user_role", "superuser"))
        .unwrap();

    assert_eq!(repo.get_by_id("paicm").unwrap().role, UserRole::Unknown);
}

#[test]
fn corrupt_signup_time_is_invalid_data() {
    let repo = repository();
    repo.create_user(&mut chaemin(), "secret").unwrap();
    repo.update_fields("paicm", &Fields::new().with("signup_at", "yesterday"))
        .unwrap();

    assert!(matches!(
        repo.get_by_id("paicm"),
        Err(StorageError::InvalidData(_))
    ));
}

#[test]
fn users_are_found_by_group() {
    let repo = repository();
    repo.create_user(&mut chaemin(), "secret").unwrap();
    let mut other = User::new("dkkim", "Dongkyu", "dk@example.com", "010-0000-0000");
    repo.create_user(&mut other, "secret").unwrap();

    let paip = repo.find_by_group("paip").unwrap();
    assert_eq!(paip.len(), 1);
    assert_eq!(paip[0].account_id, "paicm");
    assert_eq!(repo.find_all().unwrap().len(), 2);
}

#[test]
fn withdrawn_user_is_removed_by_delete() {
    let repo = repository();
    let mut user = chaemin();
    repo.create_user(&mut user, "secret").unwrap();

    user.role = UserRole::Withdrawal;
    repo.update(&mut user).unwrap();
    assert!(!repo.get_by_id("paicm").unwrap().is_active());

    repo.delete("paicm").unwrap();
    assert_eq!(repo.count().unwrap(), 0);
}
