//! CRUD over the named collections.
//!
//! Each collection is a JSON array stored under `<prefix><name>`. Every
//! mutation reads the whole array, changes it in memory and writes the whole
//! array back. There is no locking: one writer at a time is assumed.
//!
//! Array elements that are not valid records (no usable `id`) are kept as
//! [`StoredRow::Foreign`]: they are invisible to the typed API but survive
//! every rewrite and are included in raw listings.
//!
//! ```rust
//! use local_api_shim::kv_backend::MemoryBackend;
//! use local_api_shim::local_db_model::Collection;
//! use local_api_shim::record_store::RecordStore;
//! use local_api_shim::shim_config::ShimConfig;
//! use serde_json::json;
//!
//! let store = RecordStore::open(MemoryBackend::new(), &ShimConfig::default())?;
//!
//! let fields = json!({"name": "Fuel", "amount": 2500});
//! let fields = fields.as_object().cloned().unwrap_or_default();
//! let created = store.insert(Collection::Expenses, fields)?;
//!
//! assert!(store.get(Collection::Expenses, &created.id.to_string()).is_some());
//! assert_eq!(store.summary().total_expenses, 17500.0);
//! # Ok::<(), local_api_shim::AppResponse>(())
//! ```

use std::collections::BTreeMap;

use chrono::Utc;
use log::{debug, info, warn};
use serde_json::{json, Map, Value as JsonValue};

use crate::app_response::{AppResponse, Result};
use crate::kv_backend::KeyValueBackend;
use crate::local_db_model::{Collection, DashboardSummary, Fields, Record, RecordId, StoredRow};
use crate::seed;
use crate::shim_config::ShimConfig;

const COUNTERS_KEY: &str = "counters";

pub struct RecordStore<B: KeyValueBackend> {
    backend: B,
    key_prefix: String,
    seed_on_init: bool,
}

impl<B: KeyValueBackend> RecordStore<B> {
    /// Wraps `backend` and, if enabled, seeds the empty sample collections.
    pub fn open(backend: B, config: &ShimConfig) -> Result<Self> {
        let store = Self {
            backend,
            key_prefix: config.key_prefix.clone(),
            seed_on_init: config.seed_on_init,
        };

        if store.seed_on_init {
            store.seed_empty_collections()?;
        }

        Ok(store)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Records in insertion order. Missing or unreadable data lists as empty.
    /// Foreign rows are skipped but kept in storage.
    pub fn list(&self, collection: Collection) -> Vec<Record> {
        self.rows(collection)
            .into_iter()
            .filter_map(|row| match row {
                StoredRow::Typed(record) => Some(record),
                StoredRow::Foreign(_) => None,
            })
            .collect()
    }

    /// Every persisted element as stored, foreign rows included.
    pub fn list_raw(&self, collection: Collection) -> Vec<JsonValue> {
        self.rows(collection).iter().map(StoredRow::to_json).collect()
    }

    pub fn get(&self, collection: Collection, id: &str) -> Option<Record> {
        self.list(collection).into_iter().find(|r| r.id.matches(id))
    }

    pub fn insert(&self, collection: Collection, fields: Fields) -> Result<Record> {
        let mut rows = self.rows(collection);
        let id = self.next_id(collection, &rows)?;

        let record = Record::new(id, fields);
        rows.push(StoredRow::Typed(record.clone()));
        self.write(collection, &rows)?;

        debug!("Inserted {collection}/{id}");
        Ok(record)
    }

    /// Replaces every field of the matching record, keeping its id.
    pub fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> Result<Option<Record>> {
        let mut rows = self.rows(collection);

        let slot = rows.iter_mut().find_map(|row| match row {
            StoredRow::Typed(record) if record.id.matches(id) => Some(record),
            _ => None,
        });
        let Some(slot) = slot else {
            debug!("Update of {collection}/{id} skipped: no such record");
            return Ok(None);
        };

        *slot = Record::new(slot.id, fields);
        let updated = slot.clone();
        self.write(collection, &rows)?;

        Ok(Some(updated))
    }

    /// Drops any record with this id. Reports `true` whether or not one existed.
    pub fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        let mut rows = self.rows(collection);
        let before = rows.len();

        rows.retain(|row| !row.record().is_some_and(|r| r.id.matches(id)));
        self.write(collection, &rows)?;

        debug!("Delete {collection}/{id} removed {} record(s)", before - rows.len());
        Ok(true)
    }

    /// Sums over every stored row, foreign ones included.
    pub fn summary(&self) -> DashboardSummary {
        let sales = self.rows(Collection::Sales);
        let expenses = self.rows(Collection::Expenses);

        let total_income: f64 = sales.iter().map(|s| s.number("totalPrice")).sum();
        let total_expenses: f64 = expenses.iter().map(|e| e.number("amount")).sum();

        DashboardSummary {
            total_income,
            total_expenses,
            net_profit: total_income - total_expenses,
            sales_count: sales.len(),
        }
    }

    /// Raw attendance rows whose `date` equals `date`.
    pub fn attendance_by_date(&self, date: &str) -> Vec<JsonValue> {
        self.rows(Collection::Attendance)
            .iter()
            .filter(|row| row.field("date").and_then(JsonValue::as_str) == Some(date))
            .map(StoredRow::to_json)
            .collect()
    }

    /// Upserts the attendance row for `(worker_id, date)`.
    ///
    /// An existing typed row keeps its id; anything else gets a fresh one.
    pub fn mark_attendance(
        &self,
        worker_id: JsonValue,
        date: &str,
        status: &str,
    ) -> Result<Record> {
        let mut rows = self.rows(Collection::Attendance);
        let date_value = JsonValue::String(date.to_string());

        let existing = rows.iter().position(|row| {
            row.field("workerId") == Some(&worker_id) && row.field("date") == Some(&date_value)
        });

        let id = match existing.and_then(|i| rows[i].record()) {
            Some(record) => record.id,
            None => self.next_id(Collection::Attendance, &rows)?,
        };

        let mut fields = Map::new();
        fields.insert("workerId".to_string(), worker_id);
        fields.insert("date".to_string(), date_value);
        fields.insert("status".to_string(), JsonValue::String(status.to_string()));
        fields.insert("markedAt".to_string(), JsonValue::String(Utc::now().to_rfc3339()));
        let record = Record::new(id, fields);

        match existing {
            Some(i) => rows[i] = StoredRow::Typed(record.clone()),
            None => rows.push(StoredRow::Typed(record.clone())),
        }
        self.write(Collection::Attendance, &rows)?;

        debug!("Marked attendance {id} for {date}");
        Ok(record)
    }

    /// Pretty-printed snapshot of every collection plus an `exportDate`.
    pub fn export(&self) -> Result<String> {
        let mut snapshot = Map::new();
        for collection in Collection::ALL {
            let rows = JsonValue::Array(self.list_raw(collection));
            snapshot.insert(collection.name().to_string(), rows);
        }
        snapshot.insert("exportDate".to_string(), json!(Utc::now().to_rfc3339()));

        Ok(serde_json::to_string_pretty(&JsonValue::Object(snapshot))?)
    }

    /// Restores the collections present in an [`export`](Self::export)
    /// snapshot and returns how many were written.
    ///
    /// Keys that are absent or `null` leave their collection alone. The whole
    /// snapshot is validated before anything is written.
    pub fn import(&self, json: &str) -> Result<usize> {
        let snapshot = match serde_json::from_str::<JsonValue>(json)? {
            JsonValue::Object(map) => map,
            _ => return Err(AppResponse::BadRequest("Snapshot must be a JSON object".to_string())),
        };

        let mut restored = Vec::new();
        for collection in Collection::ALL {
            match snapshot.get(collection.name()) {
                None | Some(JsonValue::Null) => {}
                Some(value @ JsonValue::Array(_)) => {
                    let rows: Vec<StoredRow> = serde_json::from_value(value.clone())?;
                    restored.push((collection, rows));
                }
                Some(_) => {
                    return Err(AppResponse::BadRequest(format!(
                        "Snapshot entry '{collection}' must be an array"
                    )))
                }
            }
        }

        for (collection, rows) in &restored {
            self.write(*collection, rows)?;
            if let Some(max) = rows.iter().filter_map(|r| r.record()).map(|r| r.id.0).max() {
                self.bump_counter(*collection, max)?;
            }
        }

        info!("Imported {} collection(s)", restored.len());
        Ok(restored.len())
    }

    pub fn clear(&self, collection: Collection) -> Result<()> {
        self.backend.remove(&collection.key(&self.key_prefix))
    }

    /// Removes every collection and the id counters, then re-seeds when
    /// seeding is enabled.
    pub fn clear_all(&self) -> Result<()> {
        for collection in Collection::ALL {
            self.clear(collection)?;
        }
        self.backend.remove(&self.counters_key())?;
        info!("Cleared all collections under prefix '{}'", self.key_prefix);

        if self.seed_on_init {
            self.seed_empty_collections()?;
        }
        Ok(())
    }

    fn seed_empty_collections(&self) -> Result<()> {
        for collection in seed::SEEDED {
            if !self.rows(collection).is_empty() {
                continue;
            }

            let rows: Vec<StoredRow> = seed::seed_rows(collection)
                .into_iter()
                .map(StoredRow::Typed)
                .collect();
            self.write(collection, &rows)?;
            if let Some(max) = rows.iter().filter_map(|r| r.record()).map(|r| r.id.0).max() {
                self.bump_counter(collection, max)?;
            }
            info!("Seeded {} sample row(s) into '{collection}'", rows.len());
        }
        Ok(())
    }

    // Only a value that is not a JSON array at all degrades to empty.
    fn rows(&self, collection: Collection) -> Vec<StoredRow> {
        let key = collection.key(&self.key_prefix);

        let raw = match self.backend.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Could not read '{key}', treating as empty: {e}");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Malformed data under '{key}', treating as empty: {e}");
                Vec::new()
            }
        }
    }

    fn write(&self, collection: Collection, rows: &[StoredRow]) -> Result<()> {
        let json = serde_json::to_string(rows)?;
        self.backend.set(&collection.key(&self.key_prefix), &json)
    }

    // Counter value or highest id present, whichever is larger, plus one.
    fn next_id(&self, collection: Collection, rows: &[StoredRow]) -> Result<RecordId> {
        let issued = self.counters().get(collection.name()).copied().unwrap_or(0);
        let highest = rows.iter().filter_map(|r| r.record()).map(|r| r.id.0).max().unwrap_or(0);

        let next = issued.max(highest).checked_add(1).ok_or_else(|| {
            AppResponse::DatabaseError(format!("Identifier space exhausted for '{collection}'"))
        })?;

        self.bump_counter(collection, next)?;
        Ok(RecordId(next))
    }

    fn bump_counter(&self, collection: Collection, value: u64) -> Result<()> {
        let mut counters = self.counters();
        let entry = counters.entry(collection.name().to_string()).or_insert(0);
        *entry = (*entry).max(value);

        let json = serde_json::to_string(&counters)?;
        self.backend.set(&self.counters_key(), &json)
    }

    fn counters(&self) -> BTreeMap<String, u64> {
        let key = self.counters_key();
        match self.backend.get(&key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Malformed id counters under '{key}', rebuilding: {e}");
                BTreeMap::new()
            }),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("Could not read id counters: {e}");
                BTreeMap::new()
            }
        }
    }

    fn counters_key(&self) -> String {
        format!("{}{COUNTERS_KEY}", self.key_prefix)
    }
}
