//! Record-oriented plan storage, keyed by student

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// The entity a plan belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted plan
///
/// `plan` is kept as raw JSON: older writers stored it as a JSON-encoded
/// string, so readers must go through `PlacementGrid::from_stored`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub student_id: StudentId,
    pub plan: Value,
    pub updated_at: DateTime<Utc>,
}

impl PlanRecord {
    pub fn new(student_id: StudentId, plan: Value) -> Self {
        Self {
            student_id,
            plan,
            updated_at: Utc::now(),
        }
    }
}

/// Backend holding one plan record per student
///
/// `fetch` returns `Ok(None)` when the student has no plan yet; that is not
/// an error.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn fetch(&self, student: &StudentId) -> Result<Option<PlanRecord>, StoreError>;

    async fn insert(&self, record: PlanRecord) -> Result<(), StoreError>;

    async fn update(&self, record: PlanRecord) -> Result<(), StoreError>;
}

/// Call counts, for tests and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub fetches: usize,
    pub inserts: usize,
    pub updates: usize,
}

/// In-process store with injectable failures
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<StudentId, PlanRecord>>,
    failures: Mutex<VecDeque<StoreError>>,
    delays: Mutex<VecDeque<Duration>>,
    fetches: AtomicUsize,
    inserts: AtomicUsize,
    updates: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record directly, bypassing the counters
    pub fn with_record(self, record: PlanRecord) -> Self {
        self.records.lock().insert(record.student_id.clone(), record);
        self
    }

    /// Makes the next call (of any kind) fail with `err`
    pub fn fail_next(&self, err: StoreError) {
        self.failures.lock().push_back(err);
    }

    /// Makes the next call (of any kind) take `delay` before it runs
    pub fn delay_next(&self, delay: Duration) {
        self.delays.lock().push_back(delay);
    }

    pub fn record(&self, student: &StudentId) -> Option<PlanRecord> {
        self.records.lock().get(student).cloned()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            fetches: self.fetches.load(Ordering::SeqCst),
            inserts: self.inserts.load(Ordering::SeqCst),
            updates: self.updates.load(Ordering::SeqCst),
        }
    }

    async fn injected_delay(&self) {
        let delay = self.delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn injected_failure(&self) -> Result<(), StoreError> {
        match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn fetch(&self, student: &StudentId) -> Result<Option<PlanRecord>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.injected_delay().await;
        self.injected_failure()?;
        Ok(self.records.lock().get(student).cloned())
    }

    async fn insert(&self, record: PlanRecord) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.injected_delay().await;
        self.injected_failure()?;
        let mut records = self.records.lock();
        if records.contains_key(&record.student_id) {
            return Err(StoreError::Backend(format!(
                "plan for {} already exists",
                record.student_id
            )));
        }
        records.insert(record.student_id.clone(), record);
        Ok(())
    }

    async fn update(&self, record: PlanRecord) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.injected_delay().await;
        self.injected_failure()?;
        let mut records = self.records.lock();
        match records.get_mut(&record.student_id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::Backend(format!("no plan for {}", record.student_id))),
        }
    }
}

/// Store backed by a single JSON document on disk
///
/// The file maps student id to record. Writes go to a sibling temp file
/// first and are renamed into place.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<StudentId, PlanRecord>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(StoreError::Permission(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write_all(&self, records: &BTreeMap<StudentId, PlanRecord>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(records)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl PlanStore for JsonFileStore {
    async fn fetch(&self, student: &StudentId) -> Result<Option<PlanRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(student))
    }

    async fn insert(&self, record: PlanRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;
        if records.contains_key(&record.student_id) {
            return Err(StoreError::Backend(format!(
                "plan for {} already exists",
                record.student_id
            )));
        }
        records.insert(record.student_id.clone(), record);
        self.write_all(&records).await
    }

    async fn update(&self, record: PlanRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;
        if !records.contains_key(&record.student_id) {
            return Err(StoreError::Backend(format!("no plan for {}", record.student_id)));
        }
        records.insert(record.student_id.clone(), record);
        self.write_all(&records).await
    }
}
