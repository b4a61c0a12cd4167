//! Batch Orchestrator: drives one screening run end to end.
//!
//! Run states: validate (type filter + pre-flight) → batch 1 → cooldown →
//! batch 2 → … → aggregate. Items within a batch run one at a time so the
//! evaluation service never sees more than one in-flight call from us.
//!
//! Per-item isolation: whatever fails for one item (extraction, evaluation,
//! upload, persistence) becomes that item's record and the run moves on.
//! Each `DocumentItem` is consumed by `process_item` and dropped when it
//! returns, which deletes its temporary file on every path.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{InvalidTypePolicy, ScreeningSettings};
use crate::models::{BatchRunResult, CandidateRecord, DocumentItem, RawCandidate};
use crate::screening::aggregator::{aggregate, RunCounters};
use crate::screening::evaluator::{Evaluation, EvaluatorAdapter, EvaluatorService, InputBudget};
use crate::screening::extraction::{ExtractionBackend, ExtractionSelector};
use crate::screening::failure_log::{FailureLog, FailureReason};
use crate::screening::normalizer::{
    normalize_candidate, EXTRACTION_FAILED, INVALID_FILE_TYPE, SERVICE_UNAVAILABLE, UPLOAD_FAILED,
};
use crate::screening::records::RecordStore;
use crate::screening::storage::ObjectStore;

/// Fatal, run-level problems detected before any item is touched.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("evaluation service credentials are missing")]
    MissingCredentials,

    #[error("record store unavailable: {0}")]
    SinkUnavailable(String),
}

impl ConfigurationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing-credentials",
            Self::SinkUnavailable(_) => "sink-unavailable",
        }
    }
}

/// Inputs for one screening run.
#[derive(Debug)]
pub struct ScreeningRun {
    pub items: Vec<DocumentItem>,
    pub job_requirement: String,
    pub recruiter_notes: String,
    /// Enhanced tier: allows the cloud extraction fallback.
    pub enhanced: bool,
}

/// External collaborators, constructed once at startup and shared across runs.
pub struct Collaborators {
    pub primary_extractor: Arc<dyn ExtractionBackend>,
    pub fallback_extractor: Arc<dyn ExtractionBackend>,
    pub evaluator: Arc<dyn EvaluatorService>,
    pub object_store: Arc<dyn ObjectStore>,
    pub record_store: Arc<dyn RecordStore>,
    pub failure_log: Arc<dyn FailureLog>,
}

struct ItemOutcome {
    record: CandidateRecord,
    failed: bool,
    used_fallback: bool,
}

pub struct BatchOrchestrator {
    extraction: ExtractionSelector,
    evaluator: EvaluatorAdapter,
    object_store: Arc<dyn ObjectStore>,
    record_store: Arc<dyn RecordStore>,
    failure_log: Arc<dyn FailureLog>,
    settings: ScreeningSettings,
}

impl BatchOrchestrator {
    pub fn new(collaborators: Collaborators, settings: ScreeningSettings) -> Self {
        let Collaborators {
            primary_extractor,
            fallback_extractor,
            evaluator,
            object_store,
            record_store,
            failure_log,
        } = collaborators;

        Self {
            extraction: ExtractionSelector::new(
                primary_extractor,
                fallback_extractor,
                failure_log.clone(),
                settings.min_extracted_chars,
            ),
            evaluator: EvaluatorAdapter::new(evaluator, InputBudget::from(&settings)),
            object_store,
            record_store,
            failure_log,
            settings,
        }
    }

    /// Runs the whole pipeline. Always returns a structured result; individual
    /// failures are reported through records and `failed_files`.
    pub async fn run(&self, run: ScreeningRun) -> BatchRunResult {
        let ScreeningRun {
            items,
            job_requirement,
            recruiter_notes,
            enhanced,
        } = run;

        let valid_documents = items
            .iter()
            .filter(|item| self.settings.accepts(&item.media_type))
            .count();
        let mut counters = RunCounters {
            total_received: items.len(),
            valid_documents,
            skipped_invalid_type: items.len() - valid_documents,
            fallback_extractions: 0,
        };

        info!(
            "Screening run started: {} received, {} valid, enhanced={}",
            counters.total_received, counters.valid_documents, enhanced
        );

        if items.is_empty() {
            return aggregate(Vec::new(), counters, Vec::new());
        }

        if let Err(e) = self.preflight().await {
            error!("Screening run aborted before processing ({}): {e}", e.kind());
            return self.fail_all(items, counters, &e).await;
        }

        let mut candidates = Vec::with_capacity(items.len());
        let mut failed_files = Vec::new();

        let mut valid = Vec::with_capacity(valid_documents);
        for item in items {
            if self.settings.accepts(&item.media_type) {
                valid.push(item);
            } else {
                self.reject_invalid_type(item, &mut candidates, &mut failed_files)
                    .await;
            }
        }

        let plan = batch_sizes(valid.len(), self.settings.batch_size);
        let total_batches = plan.len();
        let mut remaining = valid.into_iter();

        for (index, size) in plan.into_iter().enumerate() {
            let batch_num = index + 1;
            info!("Processing batch {batch_num}/{total_batches} ({size} documents)");

            let mut batch_failures = 0;
            for item in remaining.by_ref().take(size) {
                let name = item.display_name.clone();
                let outcome = self
                    .process_item(item, &job_requirement, &recruiter_notes, enhanced)
                    .await;

                if outcome.used_fallback {
                    counters.fallback_extractions += 1;
                }
                if outcome.failed {
                    batch_failures += 1;
                    failed_files.push(name);
                }
                candidates.push(outcome.record);
            }

            info!(
                "Batch {batch_num}/{total_batches} complete: {} ok, {batch_failures} failed",
                size - batch_failures
            );

            if batch_num < total_batches {
                info!(
                    "Cooling down for {}s before next batch",
                    self.settings.cooldown.as_secs_f32()
                );
                tokio::time::sleep(self.settings.cooldown).await;
            }
        }

        let result = aggregate(candidates, counters, failed_files);
        info!(
            "Screening run finished: {} records, {} failed, {} fallback extractions",
            result.candidates.len(),
            result.failed_files.len(),
            result.fallback_extractions
        );
        result
    }

    async fn preflight(&self) -> Result<(), ConfigurationError> {
        if !self.evaluator.has_credentials() {
            return Err(ConfigurationError::MissingCredentials);
        }
        self.record_store
            .ready()
            .await
            .map_err(|e| ConfigurationError::SinkUnavailable(e.to_string()))
    }

    /// Converts every item into a "Service Unavailable" record without
    /// attempting extraction, upload or persistence.
    async fn fail_all(
        &self,
        items: Vec<DocumentItem>,
        counters: RunCounters,
        cause: &ConfigurationError,
    ) -> BatchRunResult {
        let mut candidates = Vec::with_capacity(items.len());
        let mut failed_files = Vec::with_capacity(items.len());

        for item in items {
            let raw = RawCandidate::placeholder(
                SERVICE_UNAVAILABLE,
                format!("Screening was not attempted for {}: {cause}", item.display_name),
            );
            candidates.push(normalize_candidate(&raw, Uuid::new_v4()));
            self.failure_log
                .log_failure(&item.display_name, FailureReason::ServiceUnavailable, Utc::now())
                .await;
            failed_files.push(item.display_name);
        }

        aggregate(candidates, counters, failed_files)
    }

    async fn reject_invalid_type(
        &self,
        item: DocumentItem,
        candidates: &mut Vec<CandidateRecord>,
        failed_files: &mut Vec<String>,
    ) {
        warn!(
            "Skipping {}: unsupported media type '{}'",
            item.display_name, item.media_type
        );
        self.failure_log
            .log_failure(&item.display_name, FailureReason::InvalidFileType, Utc::now())
            .await;

        match self.settings.invalid_type_policy {
            InvalidTypePolicy::Skip => failed_files.push(item.display_name),
            InvalidTypePolicy::Record => {
                let raw = RawCandidate::placeholder(
                    INVALID_FILE_TYPE,
                    format!(
                        "{} was not screened: '{}' is not an accepted document type",
                        item.display_name, item.media_type
                    ),
                );
                let record = normalize_candidate(&raw, Uuid::new_v4());
                self.persist(&record, &item.display_name).await;
                candidates.push(record);
            }
        }
    }

    /// extraction → evaluation → normalization → upload → persistence, for one
    /// item. Never fails; the item's file is released when this returns.
    async fn process_item(
        &self,
        item: DocumentItem,
        job_requirement: &str,
        recruiter_notes: &str,
        enhanced: bool,
    ) -> ItemOutcome {
        let id = Uuid::new_v4();
        let name = item.display_name.as_str();
        info!("Screening {name} ({} bytes)", item.size);

        let extracted = match self.extraction.extract(&item.file, name, enhanced).await {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!("Extraction failed for {name}: {e}");
                self.failure_log
                    .log_failure(name, FailureReason::ExtractionFailed, Utc::now())
                    .await;
                let raw = RawCandidate::placeholder(
                    EXTRACTION_FAILED,
                    format!("Could not extract text from {name} ({}): {e}", e.kind()),
                );
                let record = normalize_candidate(&raw, id);
                self.persist(&record, name).await;
                return ItemOutcome {
                    record,
                    failed: true,
                    used_fallback: false,
                };
            }
        };

        let evaluation = self
            .evaluator
            .evaluate(&extracted.text, job_requirement, recruiter_notes)
            .await;

        if let Evaluation::Failed { kind, .. } = &evaluation {
            self.failure_log
                .log_failure(name, FailureReason::Evaluation(*kind), Utc::now())
                .await;
            let record = normalize_candidate(&evaluation.into_raw(), id);
            self.persist(&record, name).await;
            return ItemOutcome {
                record,
                failed: true,
                used_fallback: extracted.used_fallback,
            };
        }

        let mut record = normalize_candidate(&evaluation.into_raw(), id);

        match self.object_store.upload(&item.file, name, id).await {
            Ok(url) => record.resume_url = url,
            Err(e) => {
                warn!("Upload failed for {name} ({}): {e}", e.kind());
                self.failure_log
                    .log_failure(name, FailureReason::UploadFailed, Utc::now())
                    .await;
                record.parsed_text = format!("{} (Resume upload failed: {e})", record.parsed_text);
                record.resume_url = UPLOAD_FAILED.to_string();
            }
        }

        self.persist(&record, name).await;
        info!("Screened {name}: score {}", record.score);

        ItemOutcome {
            record,
            failed: false,
            used_fallback: extracted.used_fallback,
        }
    }

    /// Store failures are logged and otherwise ignored; the record still
    /// appears in the run result.
    async fn persist(&self, record: &CandidateRecord, name: &str) {
        if let Err(e) = self.record_store.put(record).await {
            error!(
                "Failed to persist candidate {} ({name}, {}): {e}",
                record.id,
                e.kind()
            );
            self.failure_log
                .log_failure(name, FailureReason::PersistenceFailed, Utc::now())
                .await;
        }
    }
}

/// Sizes of consecutive batches for `total` items (e.g. 12 by 5 → [5, 5, 2]).
pub fn batch_sizes(total: usize, batch_size: usize) -> Vec<usize> {
    let batch_size = batch_size.max(1);
    (0..total)
        .step_by(batch_size)
        .map(|start| batch_size.min(total - start))
        .collect()
}
