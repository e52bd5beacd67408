use log::info;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::app_response::Result;
use crate::interceptor::{Dispatch, Request, RequestInterceptor};
use crate::kv_backend::LmdbBackend;
use crate::local_db_model::DashboardSummary;
use crate::record_store::RecordStore;
use crate::shim_config::ShimConfig;

/// Handle owned by FFI callers: one LMDB-backed store.
pub struct ShimState {
    pub store: RecordStore<LmdbBackend>,
}

impl ShimState {
    pub fn init(name: &str, config: &ShimConfig) -> Result<Self> {
        let backend = LmdbBackend::open(name, config.map_size)?;
        let store = RecordStore::open(backend, config)?;
        info!("Shim store '{name}' opened");
        Ok(Self { store })
    }

    /// Runs `request` and encodes the outcome as the JSON the host receives.
    ///
    /// Unmatched requests yield `{"passThrough":true}`; the host is expected
    /// to perform the real call itself.
    pub fn handle(&self, request: &Request) -> Result<String> {
        let interceptor = RequestInterceptor::new(&self.store, |_: &Request| ());

        match interceptor.handle(request)? {
            Dispatch::Handled(response) => Ok(serde_json::to_string(&response)?),
            Dispatch::PassThrough(()) => Ok(json!({ "passThrough": true }).to_string()),
        }
    }

    pub fn summary(&self) -> DashboardSummary {
        self.store.summary()
    }

    pub fn clear_all_records(&self) -> Result<()> {
        self.store.clear_all()
    }

    pub fn export(&self) -> Result<String> {
        self.store.export()
    }

    pub fn import(&self, snapshot: &str) -> Result<usize> {
        self.store.import(snapshot)
    }

    pub fn attendance_by_date(&self, date: &str) -> Result<String> {
        Ok(serde_json::to_string(&self.store.attendance_by_date(date))?)
    }

    /// `mark` is `{"workerId": ..., "date": "...", "status": "..."}`.
    pub fn mark_attendance(&self, mark: &str) -> Result<String> {
        let mark: AttendanceMark = serde_json::from_str(mark)?;
        let record = self.store.mark_attendance(mark.worker_id, &mark.date, &mark.status)?;
        Ok(serde_json::to_string(&record)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceMark {
    worker_id: JsonValue,
    date: String,
    status: String,
}
