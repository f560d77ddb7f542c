//! Persistence port for account state.
//!
//! The core never touches the filesystem; the runner supplies a JSON-file
//! implementation and the CLI uses it to resume balances between runs.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::Account;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Load and save accounts keyed by pair identifier.
pub trait AccountStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored for `pair`.
    fn load(&self, pair: &str) -> Result<Option<Account>, StoreError>;

    fn save(&self, pair: &str, account: &Account) -> Result<(), StoreError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    accounts: Mutex<HashMap<String, Account>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for InMemoryStore {
    fn load(&self, pair: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(accounts.get(pair).cloned())
    }

    fn save(&self, pair: &str, account: &Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().map_err(|_| StoreError::Poisoned)?;
        accounts.insert(pair.to_string(), account.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_pair_loads_none() {
        let store = InMemoryStore::new();
        assert!(store.load("BTC/USDT").unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let store = InMemoryStore::new();
        let account = Account::new("BTC/USDT", 1.5, 200.0);
        store.save("BTC/USDT", &account).unwrap();
        assert_eq!(store.load("BTC/USDT").unwrap(), Some(account));
    }
}
