//! Failure/telemetry log: append-only, best-effort record of per-file problems.
//!
//! Writes never fail the caller: implementations log and swallow their own errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::screening::evaluator::EvaluatorErrorKind;

const FAILURE_LIST_KEY: &str = "screening:failures";

/// Why a file was written to the failure log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The primary extractor failed and the fallback was invoked.
    PrimaryExtractionFailed,
    InsufficientContent,
    ExtractionFailed,
    Evaluation(EvaluatorErrorKind),
    UploadFailed,
    PersistenceFailed,
    InvalidFileType,
    ServiceUnavailable,
}

impl FailureReason {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::PrimaryExtractionFailed => "pdf-parse failed",
            Self::InsufficientContent => "insufficient content",
            Self::ExtractionFailed => "extraction failed",
            Self::Evaluation(kind) => match kind {
                EvaluatorErrorKind::CredentialsMissing => "evaluation failed: credentials-missing",
                EvaluatorErrorKind::EmptyResponse => "evaluation failed: empty-response",
                EvaluatorErrorKind::MalformedJson => "evaluation failed: malformed-json",
                EvaluatorErrorKind::ContentPolicyBlock => "evaluation failed: content-policy-block",
                EvaluatorErrorKind::Generic => "evaluation failed: generic",
            },
            Self::UploadFailed => "upload failed",
            Self::PersistenceFailed => "persistence failed",
            Self::InvalidFileType => "invalid file type",
            Self::ServiceUnavailable => "service unavailable",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FailureEntry<'a> {
    file_name: &'a str,
    reason: &'a str,
    at: DateTime<Utc>,
}

#[async_trait]
pub trait FailureLog: Send + Sync {
    async fn log_failure(&self, display_name: &str, reason: FailureReason, at: DateTime<Utc>);
}

/// Appends JSON entries to a Redis list.
#[derive(Clone)]
pub struct RedisFailureLog {
    conn: MultiplexedConnection,
}

impl RedisFailureLog {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl FailureLog for RedisFailureLog {
    async fn log_failure(&self, display_name: &str, reason: FailureReason, at: DateTime<Utc>) {
        let entry = FailureEntry {
            file_name: display_name,
            reason: reason.tag(),
            at,
        };
        let payload = match serde_json::to_string(&entry) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to serialize failure entry for {display_name}: {e}");
                return;
            }
        };

        let mut conn = self.conn.clone();
        let pushed: Result<i64, redis::RedisError> = redis::cmd("RPUSH")
            .arg(FAILURE_LIST_KEY)
            .arg(payload)
            .query_async(&mut conn)
            .await;
        if let Err(e) = pushed {
            warn!("Failure log write dropped for {display_name}: {e}");
        }
    }
}
