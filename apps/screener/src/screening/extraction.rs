//! Extraction: document blob to plain text, with an optional cloud fallback.
//!
//! The primary backend (`pdf-extract`, local) always runs first. Only callers on
//! the enhanced tier may escalate to the fallback backend (Claude document
//! transcription). Whatever backend produced the text, it must clear the
//! minimum-content threshold or the item fails with `InsufficientContent`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::LlmClient;
use crate::screening::failure_log::{FailureLog, FailureReason};
use crate::screening::prompts::{DOCUMENT_TRANSCRIBE_PROMPT, DOCUMENT_TRANSCRIBE_SYSTEM};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("insufficient content: {chars} characters extracted, at least {min} required")]
    InsufficientContent { chars: usize, min: usize },

    #[error("corrupt source: {0}")]
    CorruptSource(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("primary extraction failed ({primary}); fallback extraction failed ({fallback})")]
    Exhausted {
        primary: Box<ExtractionError>,
        fallback: Box<ExtractionError>,
    },
}

impl ExtractionError {
    /// Stable label. For `Exhausted` this is the fallback's kind, the last
    /// thing that went wrong.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientContent { .. } => "insufficient-content",
            Self::CorruptSource(_) => "corrupt-source",
            Self::BackendUnavailable(_) => "backend-unavailable",
            Self::Exhausted { fallback, .. } => fallback.kind(),
        }
    }
}

/// A single strategy for turning a document into text.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, path: &Path, display_name: &str) -> Result<String, ExtractionError>;
}

/// Local text-layer extraction via `pdf-extract`.
///
/// Parsing runs on the blocking pool; a parser panic surfaces as
/// `BackendUnavailable` through the join error.
pub struct PdfTextBackend;

#[async_trait]
impl ExtractionBackend for PdfTextBackend {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    async fn extract(&self, path: &Path, _display_name: &str) -> Result<String, ExtractionError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
            .await
            .map_err(|e| ExtractionError::BackendUnavailable(format!("pdf parser aborted: {e}")))?
            .map_err(|e| ExtractionError::CorruptSource(e.to_string()))
    }
}

/// Cloud transcription of the raw PDF through the LLM client. Handles scanned
/// documents that have no text layer.
pub struct CloudExtractionBackend {
    llm: LlmClient,
}

impl CloudExtractionBackend {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ExtractionBackend for CloudExtractionBackend {
    fn name(&self) -> &'static str {
        "claude-document"
    }

    async fn extract(&self, path: &Path, display_name: &str) -> Result<String, ExtractionError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ExtractionError::CorruptSource(format!("cannot read {display_name}: {e}"))
        })?;
        self.llm
            .complete_with_pdf(&bytes, DOCUMENT_TRANSCRIBE_PROMPT, DOCUMENT_TRANSCRIBE_SYSTEM)
            .await
            .map_err(|e| ExtractionError::BackendUnavailable(e.to_string()))
    }
}

/// Text produced for one item and whether the fallback had to be used.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub text: String,
    pub used_fallback: bool,
}

/// Sequences the primary and fallback backends for a single item.
pub struct ExtractionSelector {
    primary: Arc<dyn ExtractionBackend>,
    fallback: Arc<dyn ExtractionBackend>,
    failure_log: Arc<dyn FailureLog>,
    min_chars: usize,
}

impl ExtractionSelector {
    pub fn new(
        primary: Arc<dyn ExtractionBackend>,
        fallback: Arc<dyn ExtractionBackend>,
        failure_log: Arc<dyn FailureLog>,
        min_chars: usize,
    ) -> Self {
        Self {
            primary,
            fallback,
            failure_log,
            min_chars,
        }
    }

    /// Extracts text for one document.
    ///
    /// Non-enhanced callers get the primary result or its error, nothing else.
    /// Enhanced callers escalate to the fallback when the primary fails for any
    /// reason, including too little text (scanned documents).
    pub async fn extract(
        &self,
        path: &Path,
        display_name: &str,
        enhanced: bool,
    ) -> Result<Extracted, ExtractionError> {
        let primary_err = match self.run(&*self.primary, path, display_name).await {
            Ok(text) => {
                return Ok(Extracted {
                    text,
                    used_fallback: false,
                })
            }
            Err(e) => e,
        };

        if !enhanced {
            return Err(primary_err);
        }

        warn!(
            "{} failed for {display_name} ({primary_err}); trying {}",
            self.primary.name(),
            self.fallback.name()
        );
        self.failure_log
            .log_failure(display_name, FailureReason::PrimaryExtractionFailed, Utc::now())
            .await;

        match self.run(&*self.fallback, path, display_name).await {
            Ok(text) => {
                info!("Fallback extraction succeeded for {display_name}");
                Ok(Extracted {
                    text,
                    used_fallback: true,
                })
            }
            Err(fallback_err) => Err(ExtractionError::Exhausted {
                primary: Box::new(primary_err),
                fallback: Box::new(fallback_err),
            }),
        }
    }

    /// Runs one backend and applies the minimum-content threshold.
    async fn run(
        &self,
        backend: &dyn ExtractionBackend,
        path: &Path,
        display_name: &str,
    ) -> Result<String, ExtractionError> {
        let text = backend.extract(path, display_name).await?;
        let text = text.trim();
        let chars = text.chars().count();

        if chars < self.min_chars {
            warn!(
                "{} produced {chars} characters for {display_name} (minimum {})",
                backend.name(),
                self.min_chars
            );
            self.failure_log
                .log_failure(display_name, FailureReason::InsufficientContent, Utc::now())
                .await;
            return Err(ExtractionError::InsufficientContent {
                chars,
                min: self.min_chars,
            });
        }

        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::testing::{MemoryFailureLog, ScriptedBackend, LONG_RESUME_TEXT};
    use std::io::Write;
    use std::path::PathBuf;

    fn selector(
        primary: &Arc<ScriptedBackend>,
        fallback: &Arc<ScriptedBackend>,
        log: &Arc<MemoryFailureLog>,
    ) -> ExtractionSelector {
        ExtractionSelector::new(primary.clone(), fallback.clone(), log.clone(), 50)
    }

    fn path() -> PathBuf {
        PathBuf::from("/tmp/does-not-matter.pdf")
    }

    #[tokio::test]
    async fn test_primary_success_never_touches_fallback() {
        let primary = Arc::new(ScriptedBackend::text(LONG_RESUME_TEXT));
        let fallback = Arc::new(ScriptedBackend::text(LONG_RESUME_TEXT));
        let log = Arc::new(MemoryFailureLog::default());

        let out = selector(&primary, &fallback, &log)
            .extract(&path(), "cv.pdf", true)
            .await
            .unwrap();

        assert!(!out.used_fallback);
        assert_eq!(out.text, LONG_RESUME_TEXT.trim());
        assert_eq!(fallback.calls(), 0);
        assert!(log.tags().is_empty());
    }

    #[tokio::test]
    async fn test_primary_failure_without_enhanced_propagates() {
        let primary = Arc::new(ScriptedBackend::corrupt("bad xref"));
        let fallback = Arc::new(ScriptedBackend::text(LONG_RESUME_TEXT));
        let log = Arc::new(MemoryFailureLog::default());

        let err = selector(&primary, &fallback, &log)
            .extract(&path(), "cv.pdf", false)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "corrupt-source");
        assert_eq!(fallback.calls(), 0);
        assert!(log.tags().is_empty());
    }

    #[tokio::test]
    async fn test_enhanced_escalates_and_logs_fallback() {
        let primary = Arc::new(ScriptedBackend::corrupt("bad xref"));
        let fallback = Arc::new(ScriptedBackend::text(LONG_RESUME_TEXT));
        let log = Arc::new(MemoryFailureLog::default());

        let out = selector(&primary, &fallback, &log)
            .extract(&path(), "cv.pdf", true)
            .await
            .unwrap();

        assert!(out.used_fallback);
        assert_eq!(fallback.calls(), 1);
        assert_eq!(log.count("pdf-parse failed"), 1);
        assert_eq!(log.names(), vec!["cv.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_both_backends_failing_reports_both_causes() {
        let primary = Arc::new(ScriptedBackend::corrupt("bad xref"));
        let fallback = Arc::new(ScriptedBackend::unavailable("503 from upstream"));
        let log = Arc::new(MemoryFailureLog::default());

        let err = selector(&primary, &fallback, &log)
            .extract(&path(), "cv.pdf", true)
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("bad xref"), "{message}");
        assert!(message.contains("503 from upstream"), "{message}");
        assert_eq!(err.kind(), "backend-unavailable");
    }

    #[tokio::test]
    async fn test_short_text_is_insufficient_content() {
        let primary = Arc::new(ScriptedBackend::text("   Jane Doe  \n  "));
        let fallback = Arc::new(ScriptedBackend::text(LONG_RESUME_TEXT));
        let log = Arc::new(MemoryFailureLog::default());

        let err = selector(&primary, &fallback, &log)
            .extract(&path(), "scan.pdf", false)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExtractionError::InsufficientContent { chars: 8, min: 50 }
        ));
        assert_eq!(log.count("insufficient content"), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_short_fallback_text_is_also_rejected() {
        let primary = Arc::new(ScriptedBackend::text(""));
        let fallback = Arc::new(ScriptedBackend::text("too short"));
        let log = Arc::new(MemoryFailureLog::default());

        let err = selector(&primary, &fallback, &log)
            .extract(&path(), "scan.pdf", true)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "insufficient-content");
        assert_eq!(log.count("insufficient content"), 2);
        assert_eq!(log.count("pdf-parse failed"), 1);
    }

    #[tokio::test]
    async fn test_pdf_backend_rejects_non_pdf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not a pdf").unwrap();

        let result = PdfTextBackend.extract(file.path(), "junk.pdf").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pdf_backend_missing_file_is_error() {
        let result = PdfTextBackend
            .extract(Path::new("/nonexistent/resume.pdf"), "gone.pdf")
            .await;
        assert!(result.is_err());
    }
}
