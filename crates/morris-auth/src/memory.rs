//! In-memory credential store.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{CredentialError, CredentialGateway};

struct Account {
    password: String,
    online: bool,
}

/// An in-process [`CredentialGateway`] backed by a `HashMap`.
///
/// Accounts live only as long as the server process. The online flag is
/// the lock: `acquire_online_lock` checks credentials and flips it in one
/// step under the map's mutex, so two concurrent logins for the same
/// account cannot both succeed.
#[derive(Default)]
pub struct MemoryCredentials {
    accounts: Mutex<HashMap<String, Account>>,
}

impl MemoryCredentials {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialGateway for MemoryCredentials {
    async fn create_account(
        &self,
        name: &str,
        password: &str,
    ) -> Result<(), CredentialError> {
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        if accounts.contains_key(name) {
            tracing::warn!(name, "account creation failed, name already taken");
            return Err(CredentialError::NameTaken(name.to_string()));
        }
        accounts.insert(
            name.to_string(),
            Account {
                password: password.to_string(),
                online: false,
            },
        );
        tracing::debug!(name, "account created");
        Ok(())
    }

    async fn acquire_online_lock(
        &self,
        name: &str,
        password: &str,
    ) -> Result<(), CredentialError> {
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        let account = accounts
            .get_mut(name)
            .filter(|a| a.password == password)
            .ok_or(CredentialError::BadCredentials)?;
        if account.online {
            tracing::debug!(name, "online lock already held");
            return Err(CredentialError::AlreadyOnline(name.to_string()));
        }
        account.online = true;
        tracing::debug!(name, "online lock acquired");
        Ok(())
    }

    async fn release_online_lock(&self, name: &str) -> Result<(), CredentialError> {
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        let account = accounts
            .get_mut(name)
            .filter(|a| a.online)
            .ok_or_else(|| CredentialError::NotOnline(name.to_string()))?;
        account.online = false;
        tracing::debug!(name, "online lock released");
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
