//! Evaluator Adapter: scores extracted resume text against a job requirement
//! and recruiter notes through an external service.
//!
//! `EvaluatorAdapter::evaluate` never returns an error. Every failure becomes
//! an `Evaluation::Failed` value carrying a typed kind and, when the resume text
//! contains one, an email address scanned straight from the source text.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ScreeningSettings;
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_FABRICATION_INSTRUCTION};
use crate::llm_client::{LlmClient, LlmError};
use crate::models::RawCandidate;
use crate::screening::normalizer::{is_valid_email, UNKNOWN};
use crate::screening::prompts::{EVALUATION_PROMPT, EVALUATION_SYSTEM};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluatorErrorKind {
    CredentialsMissing,
    EmptyResponse,
    MalformedJson,
    ContentPolicyBlock,
    Generic,
}

impl EvaluatorErrorKind {
    /// Human-readable label written into the record summary.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CredentialsMissing => "Evaluation service unavailable: API key missing",
            Self::EmptyResponse => "Evaluator returned an empty response",
            Self::MalformedJson => "Evaluator returned malformed JSON",
            Self::ContentPolicyBlock => "Evaluation blocked by content policy",
            Self::Generic => "Evaluation call failed",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EvaluatorError {
    #[error("evaluation service credentials are missing")]
    CredentialsMissing,

    #[error("evaluation service returned an empty response")]
    EmptyResponse,

    #[error("evaluation response is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("evaluation blocked by content policy")]
    ContentPolicyBlock,

    #[error("evaluation call failed: {0}")]
    Generic(String),
}

impl EvaluatorError {
    pub fn kind(&self) -> EvaluatorErrorKind {
        match self {
            Self::CredentialsMissing => EvaluatorErrorKind::CredentialsMissing,
            Self::EmptyResponse => EvaluatorErrorKind::EmptyResponse,
            Self::MalformedJson(_) => EvaluatorErrorKind::MalformedJson,
            Self::ContentPolicyBlock => EvaluatorErrorKind::ContentPolicyBlock,
            Self::Generic(_) => EvaluatorErrorKind::Generic,
        }
    }
}

impl From<LlmError> for EvaluatorError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::MissingApiKey => Self::CredentialsMissing,
            LlmError::EmptyContent => Self::EmptyResponse,
            LlmError::Refused => Self::ContentPolicyBlock,
            other => Self::Generic(other.to_string()),
        }
    }
}

/// A fully-built request for the evaluation service.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub system: String,
    pub prompt: String,
}

/// The external scoring service. Returns the model's raw reply text; all
/// parsing belongs to the adapter.
#[async_trait]
pub trait EvaluatorService: Send + Sync {
    fn has_credentials(&self) -> bool;

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvaluatorError>;
}

#[async_trait]
impl EvaluatorService for LlmClient {
    fn has_credentials(&self) -> bool {
        self.has_api_key()
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvaluatorError> {
        Ok(self.complete(&request.prompt, &request.system).await?)
    }
}

/// Outcome of evaluating one resume.
#[derive(Debug, Clone)]
pub enum Evaluation {
    Scored(RawCandidate),
    Failed {
        kind: EvaluatorErrorKind,
        detail: String,
        recovered_email: Option<String>,
    },
}

impl Evaluation {
    /// Converts the outcome into a payload for the normalizer.
    pub fn into_raw(self) -> RawCandidate {
        match self {
            Self::Scored(raw) => raw,
            Self::Failed {
                kind,
                detail,
                recovered_email,
            } => RawCandidate::placeholder(UNKNOWN, format!("{}. {detail}", kind.label()))
                .with_email(recovered_email.as_deref()),
        }
    }
}

/// Input-size budget, expressed in estimated tokens.
#[derive(Debug, Clone, Copy)]
pub struct InputBudget {
    pub max_input_tokens: usize,
    pub chars_per_token: usize,
    pub safety_margin_tokens: usize,
}

impl From<&ScreeningSettings> for InputBudget {
    fn from(settings: &ScreeningSettings) -> Self {
        Self {
            max_input_tokens: settings.max_input_tokens,
            chars_per_token: settings.chars_per_token.max(1),
            safety_margin_tokens: settings.safety_margin_tokens,
        }
    }
}

impl InputBudget {
    /// How many resume characters fit once `overhead_chars` of instructions
    /// and the safety margin are accounted for.
    pub fn resume_char_allowance(&self, overhead_chars: usize) -> usize {
        let overhead_tokens = overhead_chars.div_ceil(self.chars_per_token);
        self.max_input_tokens
            .saturating_sub(overhead_tokens + self.safety_margin_tokens)
            * self.chars_per_token
    }
}

pub struct EvaluatorAdapter {
    service: Arc<dyn EvaluatorService>,
    budget: InputBudget,
}

impl EvaluatorAdapter {
    pub fn new(service: Arc<dyn EvaluatorService>, budget: InputBudget) -> Self {
        Self { service, budget }
    }

    pub fn has_credentials(&self) -> bool {
        self.service.has_credentials()
    }

    pub async fn evaluate(
        &self,
        resume_text: &str,
        job_requirement: &str,
        recruiter_notes: &str,
    ) -> Evaluation {
        let recovered_email = scan_email(resume_text);

        if !self.service.has_credentials() {
            return failed(EvaluatorError::CredentialsMissing, recovered_email);
        }

        let request = self.build_request(resume_text, job_requirement, recruiter_notes);
        let reply = match self.service.evaluate(&request).await {
            Ok(reply) => reply,
            Err(e) => return failed(e, recovered_email),
        };

        if reply.trim().is_empty() {
            return failed(EvaluatorError::EmptyResponse, recovered_email);
        }

        let cleaned = clean_response(&reply);
        let mut candidate: RawCandidate = match serde_json::from_str(cleaned) {
            Ok(c) => c,
            Err(e) => return failed(EvaluatorError::MalformedJson(e.to_string()), recovered_email),
        };

        // Pipeline-owned fields are never taken from the model.
        candidate.approved = None;
        candidate.resume_url = None;

        // Contact details read from the document beat whatever the model reported.
        if let Some(email) = recovered_email {
            candidate.email = Some(Value::from(email));
        }

        Evaluation::Scored(candidate)
    }

    /// Builds the prompt, truncating the resume (keeping its prefix) so the
    /// whole request fits the input budget.
    pub fn build_request(
        &self,
        resume_text: &str,
        job_requirement: &str,
        recruiter_notes: &str,
    ) -> EvaluationRequest {
        // Split at the resume slot before filling the caller-supplied fields,
        // so placeholder text inside them is never expanded into a resume.
        let (head, tail) = EVALUATION_PROMPT
            .split_once("{resume_text}")
            .unwrap_or((EVALUATION_PROMPT, ""));
        let head = head
            .replace("{job_requirement}", job_requirement.trim())
            .replace("{recruiter_notes}", recruiter_notes.trim());
        let system = [EVALUATION_SYSTEM, JSON_ONLY_SYSTEM, NO_FABRICATION_INSTRUCTION].join(" ");
        let overhead = head.chars().count() + tail.chars().count() + system.chars().count();
        let allowance = self.budget.resume_char_allowance(overhead);

        let resume = truncate_chars(resume_text, allowance);
        if resume.len() < resume_text.len() {
            debug!(
                "Truncated resume text from {} to {} characters",
                resume_text.chars().count(),
                allowance
            );
        }

        EvaluationRequest {
            system,
            prompt: format!("{head}{resume}{tail}"),
        }
    }
}

fn failed(error: EvaluatorError, recovered_email: Option<String>) -> Evaluation {
    warn!("Evaluation failed: {error}");
    Evaluation::Failed {
        kind: error.kind(),
        detail: error.to_string(),
        recovered_email,
    }
}

/// Strips Markdown code fences and isolates the outermost `{ ... }` span.
/// Text without braces is returned as-is and will fail to parse downstream.
pub fn clean_response(raw: &str) -> &str {
    let text = strip_code_fence(raw.trim());
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Returns the body of a ``` / ```json fence that opens a line before the
/// JSON object starts, or the input unchanged. Backticks inside the object
/// are left alone.
fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let opens_line = open == 0 || text[..open].ends_with('\n');
    let before_object = text.find('{').map_or(true, |brace| open < brace);
    if !opens_line || !before_object {
        return text;
    }
    let body = &text[open + 3..];
    let body = body
        .strip_prefix("json")
        .or_else(|| body.strip_prefix("JSON"))
        .unwrap_or(body);
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

fn email_scan_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}")
            .expect("email scan pattern is valid")
    })
}

/// First syntactically valid email address appearing in the text, lowercased.
pub fn scan_email(text: &str) -> Option<String> {
    email_scan_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .find(|email| is_valid_email(email))
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
