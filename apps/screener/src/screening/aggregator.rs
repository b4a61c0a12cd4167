//! Result Aggregator: ranks per-item records and attaches run counters.

use crate::models::{BatchRunResult, CandidateRecord};

/// Run-level counters collected by the orchestrator. Passed through verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub total_received: usize,
    pub valid_documents: usize,
    pub skipped_invalid_type: usize,
    pub fallback_extractions: usize,
}

/// Sorts records by descending score. `sort_by` is stable, so equal scores
/// keep processing order.
pub fn aggregate(
    mut candidates: Vec<CandidateRecord>,
    counters: RunCounters,
    failed_files: Vec<String>,
) -> BatchRunResult {
    candidates.sort_by(|a, b| b.score.cmp(&a.score));

    BatchRunResult {
        total_received: counters.total_received,
        valid_documents: counters.valid_documents,
        skipped_invalid_type: counters.skipped_invalid_type,
        fallback_extractions: counters.fallback_extractions,
        candidates,
        failed_files,
    }
}
