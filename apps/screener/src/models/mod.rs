pub mod candidate;

pub use candidate::{BatchRunResult, CandidateRecord, DocumentItem, RawCandidate};
