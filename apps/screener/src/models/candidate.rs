use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempPath;
use uuid::Uuid;

/// Canonical output unit of a screening run. Every field is always populated;
/// failure records differ only in which sentinel values they carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub job_title: String,
    pub education: String,
    pub score: u8,
    pub parsed_text: String,
    pub skills: Vec<String>,
    pub experience: u32,
    pub approved: bool,
    pub resume_url: String,
}

/// Loosely-typed candidate payload as produced by the evaluator or by a failure
/// path. Every field is optional and may hold any JSON shape; the normalizer
/// decides what survives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCandidate {
    pub name: Option<Value>,
    pub email: Option<Value>,
    pub phone: Option<Value>,
    pub location: Option<Value>,
    #[serde(alias = "job_title", alias = "title")]
    pub job_title: Option<Value>,
    pub education: Option<Value>,
    pub score: Option<Value>,
    #[serde(alias = "summary", alias = "parsed_text")]
    pub parsed_text: Option<Value>,
    pub skills: Option<Value>,
    #[serde(alias = "experienceYears", alias = "experience_years")]
    pub experience: Option<Value>,
    pub approved: Option<Value>,
    #[serde(alias = "resume_url")]
    pub resume_url: Option<Value>,
}

impl RawCandidate {
    /// A payload carrying only a name and a summary, used by failure paths.
    pub fn placeholder(name: &str, summary: String) -> Self {
        Self {
            name: Some(Value::from(name)),
            parsed_text: Some(Value::from(summary)),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: Option<&str>) -> Self {
        if let Some(email) = email {
            self.email = Some(Value::from(email));
        }
        self
    }
}

impl From<&CandidateRecord> for RawCandidate {
    fn from(record: &CandidateRecord) -> Self {
        Self {
            name: Some(Value::from(record.name.as_str())),
            email: Some(Value::from(record.email.as_str())),
            phone: Some(Value::from(record.phone.as_str())),
            location: Some(Value::from(record.location.as_str())),
            job_title: Some(Value::from(record.job_title.as_str())),
            education: Some(Value::from(record.education.as_str())),
            score: Some(Value::from(record.score)),
            parsed_text: Some(Value::from(record.parsed_text.as_str())),
            skills: Some(Value::from(record.skills.clone())),
            experience: Some(Value::from(record.experience)),
            approved: Some(Value::from(record.approved)),
            resume_url: Some(Value::from(record.resume_url.as_str())),
        }
    }
}

/// One uploaded document handed to a screening run.
///
/// The backing file is a temporary path that is removed when the item is
/// dropped, so the orchestrator releases it by letting the item go out of
/// scope at the end of that item's processing.
#[derive(Debug)]
pub struct DocumentItem {
    pub file: TempPath,
    pub display_name: String,
    pub media_type: String,
    pub size: u64,
}

/// Aggregate over one screening run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRunResult {
    pub total_received: usize,
    pub valid_documents: usize,
    pub skipped_invalid_type: usize,
    pub fallback_extractions: usize,
    /// Sorted by descending score; ties keep processing order.
    pub candidates: Vec<CandidateRecord>,
    pub failed_files: Vec<String>,
}
