//! In-memory collaborators shared by the screening tests.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::ScreeningSettings;
use crate::models::{CandidateRecord, DocumentItem};
use crate::screening::evaluator::{EvaluationRequest, EvaluatorError, EvaluatorService};
use crate::screening::extraction::{ExtractionBackend, ExtractionError};
use crate::screening::failure_log::{FailureLog, FailureReason};
use crate::screening::orchestrator::{BatchOrchestrator, Collaborators};
use crate::screening::records::{PersistenceError, RecordStore};
use crate::screening::storage::{ObjectStore, UploadError};

pub const LONG_RESUME_TEXT: &str = "Jane Doe\nSenior Backend Engineer\n\
    Six years building distributed systems in Rust and Go. Led the migration of a \
    payments ledger to PostgreSQL, owned on-call for a 40-node Kafka cluster.\n\
    Education: BSc Computer Science";

/// A temp-file-backed PDF item with the given display name.
pub fn document(name: &str) -> DocumentItem {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"%PDF-1.4\n% test fixture\n").unwrap();
    let size = file.as_file().metadata().unwrap().len();
    DocumentItem {
        file: file.into_temp_path(),
        display_name: name.to_string(),
        media_type: "application/pdf".to_string(),
        size,
    }
}

enum BackendScript {
    Text(String),
    Corrupt(String),
    Unavailable(String),
    /// Text on even calls, corrupt source on odd calls.
    Alternating(String),
}

pub struct ScriptedBackend {
    script: BackendScript,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn with(script: BackendScript) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::with(BackendScript::Text(text.to_string()))
    }

    pub fn corrupt(reason: &str) -> Self {
        Self::with(BackendScript::Corrupt(reason.to_string()))
    }

    pub fn unavailable(reason: &str) -> Self {
        Self::with(BackendScript::Unavailable(reason.to_string()))
    }

    pub fn alternating(text: &str) -> Self {
        Self::with(BackendScript::Alternating(text.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn extract(&self, _path: &Path, _display_name: &str) -> Result<String, ExtractionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            BackendScript::Text(text) => Ok(text.clone()),
            BackendScript::Corrupt(reason) => Err(ExtractionError::CorruptSource(reason.clone())),
            BackendScript::Unavailable(reason) => {
                Err(ExtractionError::BackendUnavailable(reason.clone()))
            }
            BackendScript::Alternating(text) if call % 2 == 0 => Ok(text.clone()),
            BackendScript::Alternating(_) => {
                Err(ExtractionError::CorruptSource("scripted failure".to_string()))
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryFailureLog {
    entries: Mutex<Vec<(String, &'static str)>>,
}

impl MemoryFailureLog {
    pub fn tags(&self) -> Vec<&'static str> {
        self.entries.lock().unwrap().iter().map(|(_, tag)| *tag).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn count(&self, tag: &str) -> usize {
        self.tags().iter().filter(|t| **t == tag).count()
    }
}

#[async_trait]
impl FailureLog for MemoryFailureLog {
    async fn log_failure(&self, display_name: &str, reason: FailureReason, _at: DateTime<Utc>) {
        self.entries
            .lock()
            .unwrap()
            .push((display_name.to_string(), reason.tag()));
    }
}

/// Serves scripted replies in order; the last one repeats once the script
/// runs out.
pub struct ScriptedEvaluator {
    credentials: bool,
    script: Vec<Result<String, EvaluatorError>>,
    requests: Mutex<Vec<EvaluationRequest>>,
}

impl ScriptedEvaluator {
    pub fn sequence(script: Vec<Result<String, EvaluatorError>>) -> Self {
        assert!(!script.is_empty(), "script needs at least one reply");
        Self {
            credentials: true,
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(reply: &str) -> Self {
        Self::sequence(vec![Ok(reply.to_string())])
    }

    pub fn failing(error: EvaluatorError) -> Self {
        Self::sequence(vec![Err(error)])
    }

    pub fn without_credentials() -> Self {
        Self {
            credentials: false,
            ..Self::failing(EvaluatorError::CredentialsMissing)
        }
    }

    pub fn requests(&self) -> Vec<EvaluationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl EvaluatorService for ScriptedEvaluator {
    fn has_credentials(&self) -> bool {
        self.credentials
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvaluatorError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let index = (requests.len() - 1).min(self.script.len() - 1);
        self.script[index].clone()
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    failing: bool,
    uploads: Mutex<Vec<(Uuid, String)>>,
}

impl MemoryObjectStore {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Number of upload attempts, successful or not.
    pub fn uploads(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        _path: &Path,
        display_name: &str,
        owner_id: Uuid,
    ) -> Result<String, UploadError> {
        self.uploads
            .lock()
            .unwrap()
            .push((owner_id, display_name.to_string()));
        if self.failing {
            return Err(UploadError::TransportFailure("connection reset".to_string()));
        }
        Ok(format!("https://resumes.test/{owner_id}/{display_name}"))
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    unready: bool,
    failing_writes: bool,
    records: Mutex<Vec<CandidateRecord>>,
}

impl MemoryRecordStore {
    /// Ids of successfully stored records, in write order.
    pub fn ids(&self) -> Vec<Uuid> {
        self.records.lock().unwrap().iter().map(|r| r.id).collect()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn ready(&self) -> Result<(), PersistenceError> {
        if self.unready {
            return Err(PersistenceError::WriteFailure("connection refused".to_string()));
        }
        Ok(())
    }

    async fn put(&self, record: &CandidateRecord) -> Result<(), PersistenceError> {
        if self.failing_writes {
            return Err(PersistenceError::WriteFailure("disk full".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        records.retain(|r| r.id != record.id);
        records.push(record.clone());
        Ok(())
    }
}

/// Wires fakes into a `BatchOrchestrator` and keeps handles for assertions.
pub struct Harness {
    pub primary: Arc<ScriptedBackend>,
    pub fallback: Arc<ScriptedBackend>,
    pub evaluator: Arc<ScriptedEvaluator>,
    pub storage: Arc<MemoryObjectStore>,
    pub records: Arc<MemoryRecordStore>,
    pub failure_log: Arc<MemoryFailureLog>,
    settings: ScreeningSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(ScreeningSettings::default())
    }

    pub fn with_settings(settings: ScreeningSettings) -> Self {
        Self {
            primary: Arc::new(ScriptedBackend::text(LONG_RESUME_TEXT)),
            fallback: Arc::new(ScriptedBackend::unavailable("fallback not configured")),
            evaluator: Arc::new(ScriptedEvaluator::replying("{}")),
            storage: Arc::new(MemoryObjectStore::default()),
            records: Arc::new(MemoryRecordStore::default()),
            failure_log: Arc::new(MemoryFailureLog::default()),
            settings,
        }
    }

    pub fn with_primary(mut self, backend: ScriptedBackend) -> Self {
        self.primary = Arc::new(backend);
        self
    }

    pub fn with_fallback(mut self, backend: ScriptedBackend) -> Self {
        self.fallback = Arc::new(backend);
        self
    }

    pub fn with_evaluator(mut self, evaluator: ScriptedEvaluator) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    pub fn with_failing_storage(mut self) -> Self {
        self.storage = Arc::new(MemoryObjectStore::failing());
        self
    }

    pub fn with_unready_store(mut self) -> Self {
        self.records = Arc::new(MemoryRecordStore {
            unready: true,
            ..MemoryRecordStore::default()
        });
        self
    }

    pub fn with_failing_writes(mut self) -> Self {
        self.records = Arc::new(MemoryRecordStore {
            failing_writes: true,
            ..MemoryRecordStore::default()
        });
        self
    }

    pub fn orchestrator(&self) -> BatchOrchestrator {
        BatchOrchestrator::new(
            Collaborators {
                primary_extractor: self.primary.clone(),
                fallback_extractor: self.fallback.clone(),
                evaluator: self.evaluator.clone(),
                object_store: self.storage.clone(),
                record_store: self.records.clone(),
                failure_log: self.failure_log.clone(),
            },
            self.settings.clone(),
        )
    }
}
