use keyring::Entry;
use tracing::debug;

use super::store::{StoreError, TokenStore};
use super::tokens::StoredSession;

const SERVICE_NAME: &str = "gymtrack";

/// Keychain account the session document is stored under
const DEFAULT_ACCOUNT: &str = "session";

/// Session stored in the OS keychain as a single JSON secret.
pub struct KeyringTokenStore {
    service: String,
    account: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_account(DEFAULT_ACCOUNT)
    }

    /// Separate keychain slot, e.g. one per backend environment.
    pub fn with_account(account: impl Into<String>) -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, &self.account)?)
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        let secret = serde_json::to_string(session)?;
        self.entry()?.set_password(&secret)?;
        debug!(account = %self.account, "Session stored in keychain");
        Ok(())
    }

    fn load(&self) -> Result<Option<StoredSession>, StoreError> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(Some(serde_json::from_str(&secret)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
