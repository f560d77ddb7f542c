//! JSON-file account store.
//!
//! All pairs live in one file as a JSON object keyed by pair identifier.
//! Writes go to a sibling temp file first and are renamed into place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use regimelab_core::domain::Account;
use regimelab_core::store::{AccountStore, StoreError};

#[derive(Debug)]
pub struct JsonAccountStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonAccountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, Account>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl AccountStore for JsonAccountStore {
    fn load(&self, pair: &str) -> Result<Option<Account>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.read_all()?.remove(pair))
    }

    fn save(&self, pair: &str, account: &Account) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut accounts = self.read_all()?;
        accounts.insert(pair.to_string(), account.clone());
        let json = serde_json::to_string_pretty(&accounts)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(pair, path = %self.path.display(), "saved account");
        Ok(())
    }
}
