//! Candidate Normalizer: turns any raw payload into a canonical `CandidateRecord`.
//!
//! Every record the pipeline emits passes through `normalize_candidate`, whether
//! it came from a successful evaluation or from a failure path. The function is
//! total: unusable input degrades to sentinels, never to an error.
//!
//! Re-normalizing an already-normalized record yields the same record.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{CandidateRecord, RawCandidate};

pub const UNKNOWN: &str = "Unknown";
pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_SUMMARY: &str = "No summary available.";

pub const EXTRACTION_FAILED: &str = "Extraction Failed";
pub const INVALID_FILE_TYPE: &str = "Invalid File Type";
pub const SERVICE_UNAVAILABLE: &str = "Service Unavailable";
pub const UPLOAD_FAILED: &str = "Upload Failed";

/// Names that mark a record as a placeholder rather than a person.
const SENTINEL_NAMES: &[&str] = &[UNKNOWN, EXTRACTION_FAILED, INVALID_FILE_TYPE, SERVICE_UNAVAILABLE];

/// Domain used for generated fallback addresses. `.invalid` is reserved and
/// never routes, so a fallback can't reach a real inbox.
const FALLBACK_EMAIL_DOMAIN: &str = "candidates.invalid";

const NOT_APPLICABLE_TOKENS: &[&str] = &[
    "n/a",
    "na",
    "not applicable",
    "none",
    "null",
    "undefined",
    "unknown",
    "-",
];

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9-]+(\.[a-z0-9-]+)*\.[a-z]{2,}$")
            .expect("email pattern is valid")
    })
}

/// Normalizes a raw payload into a fully-populated record with the given id.
pub fn normalize_candidate(raw: &RawCandidate, id: Uuid) -> CandidateRecord {
    let name = text_or(raw.name.as_ref(), UNKNOWN);
    let email = normalize_email(raw.email.as_ref(), &name, id);

    CandidateRecord {
        id,
        email,
        phone: contact_text_or(raw.phone.as_ref(), NOT_AVAILABLE),
        location: text_or(raw.location.as_ref(), NOT_AVAILABLE),
        job_title: text_or(raw.job_title.as_ref(), NOT_AVAILABLE),
        education: text_or(raw.education.as_ref(), NOT_AVAILABLE),
        score: normalize_score(raw.score.as_ref()),
        parsed_text: text_or(raw.parsed_text.as_ref(), NO_SUMMARY),
        skills: normalize_skills(raw.skills.as_ref()),
        experience: normalize_experience(raw.experience.as_ref()),
        approved: raw.approved.as_ref().and_then(Value::as_bool).unwrap_or(false),
        resume_url: text_or(raw.resume_url.as_ref(), NOT_AVAILABLE),
        name,
    }
}

/// Returns true when the address satisfies the lowercase address syntax
/// every emitted record must carry.
pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

/// Trimmed string value, or the sentinel when absent, blank, non-string, or a
/// "not applicable" token.
fn text_or(value: Option<&Value>, sentinel: &str) -> String {
    let text = match value {
        Some(Value::String(s)) => s.trim(),
        _ => return sentinel.to_string(),
    };
    if text.is_empty() || is_not_applicable(text) {
        sentinel.to_string()
    } else {
        text.to_string()
    }
}

/// Like `text_or`, but also accepts a bare JSON number (phone numbers often
/// come back unquoted).
fn contact_text_or(value: Option<&Value>, sentinel: &str) -> String {
    match value {
        Some(Value::Number(n)) => n.to_string(),
        other => text_or(other, sentinel),
    }
}

fn is_not_applicable(text: &str) -> bool {
    let lower = text.to_lowercase();
    NOT_APPLICABLE_TOKENS.contains(&lower.as_str())
}

fn normalize_email(value: Option<&Value>, name: &str, id: Uuid) -> String {
    if let Some(Value::String(raw)) = value {
        let candidate = raw.trim().to_lowercase();
        if is_valid_email(&candidate) {
            return candidate;
        }
    }
    fallback_email(name, id)
}

/// Deterministic placeholder address for a record whose email is unusable.
///
/// Derived from the slugified name plus a slice of the record id so that two
/// candidates with the same name in one run stay distinct. When the name is a
/// sentinel the full id is used instead.
fn fallback_email(name: &str, id: Uuid) -> String {
    let slug = slugify(name);
    let id_hex = id.simple().to_string();
    if slug.is_empty() || SENTINEL_NAMES.contains(&name) || is_not_applicable(name) {
        format!("candidate.{id_hex}@{FALLBACK_EMAIL_DOMAIN}")
    } else {
        format!("{slug}.{}@{FALLBACK_EMAIL_DOMAIN}", &id_hex[..8])
    }
}

/// Lowercase ASCII alphanumeric runs joined by dots ("Mary-Jane O'Neil" →
/// "mary.jane.o.neil").
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

fn normalize_score(value: Option<&Value>) -> u8 {
    match as_number(value) {
        Some(n) if n.is_finite() => n.round().clamp(0.0, 100.0) as u8,
        _ => 0,
    }
}

fn normalize_experience(value: Option<&Value>) -> u32 {
    match as_number(value) {
        Some(n) if n.is_finite() && n >= 0.0 => n.round().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

/// Numbers, and strings that parse as numbers ("87", " 4.5 ").
fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn normalize_skills(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
