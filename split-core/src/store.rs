//! Browser-style key/value persistence for the local form snapshot and the
//! currency preference.
//!
//! Everything is stored as strings under fixed keys. Readers are defensive:
//! a value that does not look right is coerced or ignored, never trusted.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Currency, SharePayload, coerce_expenses};

/// Consolidated form snapshot.
pub const FORM_KEY: &str = "fairshare_form";
/// Selected display currency code.
pub const CURRENCY_KEY: &str = "fairshare_currency";

/// Flat keys written by the first version of the calculator.
pub mod legacy_keys {
    pub const NAME1: &str = "name1";
    pub const NAME2: &str = "name2";
    pub const SALARY1: &str = "salary1";
    pub const SALARY2: &str = "salary2";
    pub const EXPENSES: &str = "expenses";
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("stored value under '{key}' is not valid JSON: {message}")]
    Corrupt { key: String, message: String },
}

/// Synchronous string storage, in the spirit of `localStorage`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store for tests and for sessions that should leave no trace.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Writes the snapshot under [`FORM_KEY`].
pub fn save_snapshot(
    store: &dyn KeyValueStore,
    snapshot: &SharePayload,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(snapshot).map_err(|e| StoreError::Backend(e.to_string()))?;
    store.set(FORM_KEY, &json)
}

/// Reads the saved form, falling back to the legacy flat keys when the
/// consolidated key is absent.
///
/// `Ok(None)` means there is nothing usable to restore. A consolidated value
/// that is not JSON is an error; one that is JSON but not an object is
/// treated as absent.
pub fn load_snapshot(store: &dyn KeyValueStore) -> Result<Option<SharePayload>, StoreError> {
    let Some(raw) = store.get(FORM_KEY)?.filter(|s| !s.is_empty()) else {
        return load_legacy_snapshot(store);
    };

    let value: Value = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
        key: FORM_KEY.to_string(),
        message: e.to_string(),
    })?;

    let snapshot = SharePayload::from_untrusted(&value);
    if snapshot.is_none() {
        debug!("ignoring non-object form snapshot");
    }
    Ok(snapshot)
}

fn load_legacy_snapshot(store: &dyn KeyValueStore) -> Result<Option<SharePayload>, StoreError> {
    let read = |key: &str| -> Result<String, StoreError> {
        Ok(store.get(key)?.unwrap_or_default())
    };

    let name1 = read(legacy_keys::NAME1)?;
    let name2 = read(legacy_keys::NAME2)?;
    let salary1 = read(legacy_keys::SALARY1)?;
    let salary2 = read(legacy_keys::SALARY2)?;
    let expenses_raw = read(legacy_keys::EXPENSES)?;

    if [&name1, &name2, &salary1, &salary2, &expenses_raw]
        .iter()
        .all(|v| v.is_empty())
    {
        return Ok(None);
    }

    let expenses = if expenses_raw.is_empty() {
        Vec::new()
    } else {
        let value: Value = serde_json::from_str(&expenses_raw).map_err(|e| StoreError::Corrupt {
            key: legacy_keys::EXPENSES.to_string(),
            message: e.to_string(),
        })?;
        value.as_array().map(|items| coerce_expenses(items)).unwrap_or_default()
    };

    debug!("restoring from legacy storage keys");
    Ok(Some(SharePayload {
        name1,
        name2,
        salary1,
        salary2,
        expenses,
        currency: None,
    }))
}

/// Resolves the display currency.
///
/// Looks at [`CURRENCY_KEY`] first, then the `currency` field of the saved
/// form, then the locale list. Storage failures are logged and skipped.
pub fn load_currency<'a, I>(
    store: &dyn KeyValueStore,
    locales: I,
) -> Currency
where
    I: IntoIterator<Item = &'a str>,
{
    match store.get(CURRENCY_KEY) {
        Ok(Some(code)) if !code.is_empty() => return Currency::from_code_or_default(&code),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "could not read currency preference"),
    }

    let from_form = store
        .get(FORM_KEY)
        .ok()
        .flatten()
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .and_then(|v| v.get("currency").and_then(Value::as_str).map(str::to_string))
        .filter(|code| !code.is_empty());
    if let Some(code) = from_form {
        return Currency::from_code_or_default(&code);
    }

    Currency::detect_from_locales(locales)
}

pub fn save_currency(
    store: &dyn KeyValueStore,
    currency: Currency,
) -> Result<(), StoreError> {
    store.set(CURRENCY_KEY, currency.code())
}
