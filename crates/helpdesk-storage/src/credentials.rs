//! High-level API for the stored session.

use crate::{CredentialStorage, StorageError, StorageKeys, StorageResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend role codes: `1 = admin`, `2 = user`, `3 = agent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum UserRole {
    Admin,
    User,
    Agent,
    /// A role code this client does not know about.
    Unknown(u8),
}

impl From<u8> for UserRole {
    fn from(code: u8) -> Self {
        match code {
            1 => UserRole::Admin,
            2 => UserRole::User,
            3 => UserRole::Agent,
            other => UserRole::Unknown(other),
        }
    }
}

impl From<UserRole> for u8 {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => 1,
            UserRole::User => 2,
            UserRole::Agent => 3,
            UserRole::Unknown(code) => code,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
            UserRole::Agent => write!(f, "agent"),
            UserRole::Unknown(code) => write!(f, "role-{}", code),
        }
    }
}

/// Signed-in user, as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: UserRole,
}

/// Typed access to the stored credentials and profile.
pub struct CredentialStore {
    storage: Box<dyn CredentialStorage>,
}

impl CredentialStore {
    /// Create a new credential store over the given backend
    pub fn new(storage: Box<dyn CredentialStorage>) -> Self {
        Self { storage }
    }

    /// Current access credential, if any
    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::ACCESS)
    }

    /// Current refresh credential, if any
    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH)
    }

    /// Replace the access credential (after a refresh)
    pub fn set_access_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::ACCESS, token)
    }

    /// Replace the refresh credential
    pub fn set_refresh_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::REFRESH, token)
    }

    /// Store both credentials (after login or registration)
    pub fn set_session(&self, access: &str, refresh: &str) -> StorageResult<()> {
        self.set_access_token(access)?;
        self.set_refresh_token(refresh)
    }

    /// True when a refresh credential exists, i.e. the session can be
    /// recovered even if the access credential is gone.
    pub fn has_session(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::REFRESH)
    }

    /// Stored user profile, if any
    pub fn user_profile(&self) -> StorageResult<Option<UserProfile>> {
        match self.storage.get(StorageKeys::USER)? {
            Some(json) => {
                let profile = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Store the user profile
    pub fn set_user_profile(&self, profile: &UserProfile) -> StorageResult<()> {
        let json =
            serde_json::to_string(profile).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::USER, &json)
    }

    /// Erase both credentials and the profile (logged-out state)
    pub fn clear_session(&self) -> StorageResult<()> {
        tracing::debug!("Clearing stored session");
        self.storage.delete_many(&[
            StorageKeys::ACCESS,
            StorageKeys::REFRESH,
            StorageKeys::USER,
        ])
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    fn store() -> CredentialStore {
        CredentialStore::new(Box::new(MemoryStorage::new()))
    }

    #[test]
    fn test_empty_store_is_logged_out() {
        let store = store();
        assert_eq!(store.access_token().unwrap(), None);
        assert_eq!(store.refresh_token().unwrap(), None);
        assert!(!store.has_session().unwrap());
        assert_eq!(store.user_profile().unwrap(), None);
    }

    #[test]
    fn test_set_and_clear_session() {
        let store = store();
        store.set_session("access-token", "refresh-token").unwrap();
        store
            .set_user_profile(&UserProfile {
                id: 7,
                username: "maria".to_string(),
                email: Some("maria@example.com".to_string()),
                role: UserRole::Agent,
            })
            .unwrap();

        assert!(store.has_session().unwrap());
        assert_eq!(store.access_token().unwrap(), Some("access-token".to_string()));

        store.clear_session().unwrap();

        assert_eq!(store.access_token().unwrap(), None);
        assert_eq!(store.refresh_token().unwrap(), None);
        assert_eq!(store.user_profile().unwrap(), None);
    }

    #[test]
    fn test_access_rotation_keeps_refresh() {
        let store = store();
        store.set_session("a-1", "r-1").unwrap();

        store.set_access_token("a-2").unwrap();

        assert_eq!(store.access_token().unwrap(), Some("a-2".to_string()));
        assert_eq!(store.refresh_token().unwrap(), Some("r-1".to_string()));
    }

    #[test]
    fn test_profile_parses_backend_payload() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"id": 3, "username": "admin", "email": "admin@example.com", "role": 1}"#,
        )
        .unwrap();

        assert_eq!(profile.role, UserRole::Admin);
        assert_eq!(serde_json::to_value(profile.role).unwrap(), serde_json::json!(1));
    }

    #[test]
    fn test_unknown_role_is_preserved() {
        let role: UserRole = serde_json::from_str("9").unwrap();
        assert_eq!(role, UserRole::Unknown(9));
        assert_eq!(role.to_string(), "role-9");
        assert_eq!(u8::from(role), 9);
    }

    #[test]
    fn test_corrupt_profile_is_encoding_error() {
        let storage = MemoryStorage::new();
        storage.set(StorageKeys::USER, "not json").unwrap();
        let store = CredentialStore::new(Box::new(storage));

        assert!(matches!(store.user_profile(), Err(StorageError::Encoding(_))));
    }
}
