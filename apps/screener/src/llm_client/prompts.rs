// Shared prompt fragments used by more than one caller of the LLM client.
// Each service that needs LLM calls defines its own prompts alongside it.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction that keeps the model from inventing contact details.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
    CRITICAL: Only report contact details (name, email, phone, location) that appear \
    verbatim in the resume text. If a detail is not present, return \"N/A\" for it. \
    Never guess or construct an email address.";
