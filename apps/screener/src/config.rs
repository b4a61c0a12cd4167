use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
///
/// `ANTHROPIC_API_KEY` is optional: a missing key is reported per
/// screening run as a configuration error instead of refusing to boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_public_url: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub screening: ScreeningSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3_bucket = require_env("S3_BUCKET")?;
        let s3_endpoint = require_env("S3_ENDPOINT")?;
        let s3_public_url = std::env::var("S3_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", s3_endpoint.trim_end_matches('/'), s3_bucket));

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket,
            s3_endpoint,
            s3_public_url,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            screening: ScreeningSettings::from_env()?,
        })
    }
}

/// What happens to uploads whose declared media type is not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTypePolicy {
    /// Count the item as skipped and write it to the failure log only.
    Skip,
    /// Emit an "Invalid File Type" candidate record for the item.
    Record,
}

impl std::str::FromStr for InvalidTypePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "log" => Ok(Self::Skip),
            "record" => Ok(Self::Record),
            other => anyhow::bail!("unknown INVALID_TYPE_POLICY '{other}' (expected skip|record)"),
        }
    }
}

/// Tunables for the screening pipeline. Defaults match the reference
/// deployment: batches of 5, a 5 second cooldown, 50 character minimum.
#[derive(Debug, Clone)]
pub struct ScreeningSettings {
    pub batch_size: usize,
    pub cooldown: Duration,
    pub min_extracted_chars: usize,
    pub max_input_tokens: usize,
    pub chars_per_token: usize,
    pub safety_margin_tokens: usize,
    pub invalid_type_policy: InvalidTypePolicy,
    pub accepted_media_types: Vec<String>,
    /// Request body cap for the screening upload route, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ScreeningSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            cooldown: Duration::from_secs(5),
            min_extracted_chars: 50,
            max_input_tokens: 100_000,
            chars_per_token: 3,
            safety_margin_tokens: 1_000,
            invalid_type_policy: InvalidTypePolicy::Skip,
            accepted_media_types: vec!["application/pdf".to_string()],
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ScreeningSettings {
    pub fn from_env() -> Result<Self> {
        let default = Self::default();

        let batch_size: usize = parse_env("SCREENING_BATCH_SIZE", default.batch_size)?;
        let chars_per_token: usize = parse_env("EVALUATOR_CHARS_PER_TOKEN", default.chars_per_token)?;
        if batch_size == 0 {
            anyhow::bail!("SCREENING_BATCH_SIZE must be at least 1");
        }
        if chars_per_token == 0 {
            anyhow::bail!("EVALUATOR_CHARS_PER_TOKEN must be at least 1");
        }

        let accepted_media_types = match std::env::var("ACCEPTED_MEDIA_TYPES") {
            Ok(raw) => raw
                .split(',')
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            Err(_) => default.accepted_media_types,
        };

        Ok(Self {
            batch_size,
            cooldown: Duration::from_secs(parse_env(
                "SCREENING_COOLDOWN_SECS",
                default.cooldown.as_secs(),
            )?),
            min_extracted_chars: parse_env("MIN_EXTRACTED_CHARS", default.min_extracted_chars)?,
            max_input_tokens: parse_env("EVALUATOR_MAX_INPUT_TOKENS", default.max_input_tokens)?,
            chars_per_token,
            safety_margin_tokens: parse_env(
                "EVALUATOR_SAFETY_MARGIN_TOKENS",
                default.safety_margin_tokens,
            )?,
            invalid_type_policy: parse_env("INVALID_TYPE_POLICY", default.invalid_type_policy)?,
            accepted_media_types,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", default.max_upload_bytes)?,
        })
    }

    /// Whether a declared media type routes into extraction.
    pub fn accepts(&self, media_type: &str) -> bool {
        let media_type = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.accepted_media_types.iter().any(|t| *t == media_type)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let settings = ScreeningSettings::default();
        assert_eq!(settings.batch_size, 5);
        assert_eq!(settings.cooldown, Duration::from_secs(5));
        assert_eq!(settings.min_extracted_chars, 50);
        assert_eq!(settings.invalid_type_policy, InvalidTypePolicy::Skip);
        assert!(settings.max_upload_bytes > 2 * 1024 * 1024);
    }

    #[test]
    fn test_accepts_ignores_case_and_parameters() {
        let settings = ScreeningSettings::default();
        assert!(settings.accepts("application/pdf"));
        assert!(settings.accepts("Application/PDF; charset=binary"));
        assert!(!settings.accepts("image/png"));
        assert!(!settings.accepts(""));
    }

    #[test]
    fn test_invalid_type_policy_parses() {
        assert_eq!("record".parse::<InvalidTypePolicy>().unwrap(), InvalidTypePolicy::Record);
        assert_eq!(" SKIP ".parse::<InvalidTypePolicy>().unwrap(), InvalidTypePolicy::Skip);
        assert!("drop".parse::<InvalidTypePolicy>().is_err());
    }
}
