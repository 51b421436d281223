//! Storage key constants.

/// Storage keys used by the client
pub struct StorageKeys;

impl StorageKeys {
    /// Short-lived bearer credential
    pub const ACCESS: &'static str = "access";

    /// Long-lived credential used only to mint a new access credential
    pub const REFRESH: &'static str = "refresh";

    /// Signed-in user profile (JSON)
    pub const USER: &'static str = "user";
}
