use axum::{
    extract::{multipart::Field, Multipart, State},
    Json,
};
use tracing::info;

use crate::errors::AppError;
use crate::models::{BatchRunResult, DocumentItem};
use crate::screening::orchestrator::ScreeningRun;
use crate::state::AppState;

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// POST /api/v1/screenings
///
/// Multipart fields: `jobRequirement`, `recruiterNotes`, `enhanced` and one or
/// more `resumes` file parts.
pub async fn handle_screening(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchRunResult>, AppError> {
    let mut job_requirement = String::new();
    let mut recruiter_notes = String::new();
    let mut enhanced = false;
    let mut items = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "jobRequirement" => job_requirement = read_text(field).await?,
            "recruiterNotes" => recruiter_notes = read_text(field).await?,
            "enhanced" => enhanced = parse_flag(&read_text(field).await?),
            "resumes" => {
                let item = spool_document(field, items.len()).await?;
                items.push(item);
            }
            other => info!("Ignoring unexpected multipart field '{other}'"),
        }
    }

    if job_requirement.trim().is_empty() {
        return Err(AppError::Validation(
            "jobRequirement must not be empty".to_string(),
        ));
    }
    if items.is_empty() {
        return Err(AppError::Validation(
            "At least one file is required in 'resumes'".to_string(),
        ));
    }

    let result = state
        .orchestrator
        .run(ScreeningRun {
            items,
            job_requirement,
            recruiter_notes,
            enhanced,
        })
        .await;

    Ok(Json(result))
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read field '{name}': {e}")))
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Writes one uploaded file to a temp file owned by the returned item.
async fn spool_document(field: Field<'_>, index: usize) -> Result<DocumentItem, AppError> {
    let display_name = field
        .file_name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("resume-{}", index + 1));
    let media_type = field
        .content_type()
        .unwrap_or(FALLBACK_MEDIA_TYPE)
        .to_string();

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read file '{display_name}': {e}")))?;

    let file = tempfile::NamedTempFile::new()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create temp file: {e}")))?
        .into_temp_path();
    tokio::fs::write(&file, &data)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to spool '{display_name}': {e}")))?;

    info!(
        "Received {display_name} ({media_type}, {} bytes)",
        data.len()
    );

    Ok(DocumentItem {
        file,
        display_name,
        media_type,
        size: data.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("maybe"));
    }
}
