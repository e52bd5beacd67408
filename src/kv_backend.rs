//! String-keyed, string-valued persistence layers.
//!
//! [`RecordStore`](crate::record_store::RecordStore) only ever reads or
//! replaces whole values, so a backend needs nothing beyond get/set/remove.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lmdb::{Database, Environment, Transaction, WriteFlags};
use log::info;

use crate::app_response::{AppResponse, Result};

pub trait KeyValueBackend {
    /// Returns `Ok(None)` when the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Durable backend: one LMDB environment directory named `<name>.lmdb`.
pub struct LmdbBackend {
    env: Environment,
    db: Database,
    path: PathBuf,
}

impl LmdbBackend {
    /// Opens (creating if needed) the environment at `<name>.lmdb`.
    pub fn open(name: &str, map_size: usize) -> Result<Self> {
        let path = PathBuf::from(format!("{name}.lmdb"));
        fs::create_dir_all(&path).map_err(|e| {
            AppResponse::DatabaseError(format!("Cannot create {}: {e}", path.display()))
        })?;

        let env = Environment::new().set_map_size(map_size).open(&path)?;
        let db = env.open_db(None)?;

        info!("LMDB environment ready at {}", path.display());
        Ok(Self { env, db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueBackend for LmdbBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let txn = self.env.begin_ro_txn()?;
        let value = match txn.get(self.db, &key) {
            Ok(bytes) => Some(String::from_utf8(bytes.to_vec()).map_err(|e| {
                AppResponse::SerializationError(format!("Value under '{key}' is not UTF-8: {e}"))
            })?),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.abort();
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut txn = self.env.begin_rw_txn()?;
        match txn.del(self.db, &key, None) {
            Ok(()) | Err(lmdb::Error::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        txn.commit()?;
        Ok(())
    }
}

/// In-process backend, lost on drop.
///
/// An optional byte quota mimics the capacity limit hosts put on origin
/// storage: a `set` that would push the total of keys and values past it
/// fails with [`AppResponse::DatabaseError`] and leaves the map untouched.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: RefCell::new(BTreeMap::new()),
            quota: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(quota) = self.quota {
            let needed = self.used_bytes_without(key) + key.len() + value.len();
            if needed > quota {
                return Err(AppResponse::DatabaseError(format!(
                    "Storage quota exceeded writing '{key}': {needed} > {quota} bytes"
                )));
            }
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for &B {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}
