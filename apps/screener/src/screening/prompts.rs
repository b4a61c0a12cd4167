// Screening LLM prompt templates.
// All prompts for the screening module are defined here.

pub const EVALUATION_SYSTEM: &str = "\
You are an experienced technical recruiter screening resumes. \
You score each resume against BOTH the job requirement and the recruiter's own notes.";

/// Placeholders: {job_requirement}, {recruiter_notes}, {resume_text}.
/// `{resume_text}` must stay last so truncation only ever cuts resume content.
pub const EVALUATION_PROMPT: &str = r#"Evaluate the candidate below.

WEIGHTING (mandatory):
- 50% of the score reflects fit against the JOB REQUIREMENT.
- 50% of the score reflects fit against the RECRUITER NOTES (preferences and red flags).
Weigh the two equally. A perfect match on one and a miss on the other scores about 50.

JOB REQUIREMENT:
{job_requirement}

RECRUITER NOTES:
{recruiter_notes}

OUTPUT SCHEMA (return exactly this structure):
{
  "name": "string",
  "email": "string",
  "phone": "string",
  "location": "string",
  "score": integer 0-100,
  "summary": "2-4 sentences explaining the score against both inputs",
  "skills": ["string"],
  "experienceYears": integer,
  "jobTitle": "string (most recent title)",
  "education": "string (highest degree and institution)"
}

RESUME TEXT:
{resume_text}"#;

pub const DOCUMENT_TRANSCRIBE_SYSTEM: &str = "\
You are a document transcription engine. \
Output the plain text content of the supplied document and nothing else.";

pub const DOCUMENT_TRANSCRIBE_PROMPT: &str = "\
Transcribe all readable text in this resume in reading order. \
Preserve section headings and line breaks. Do not summarize, translate, or comment.";
