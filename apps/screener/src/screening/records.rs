//! Record store: terminal sink for candidate records.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::models::CandidateRecord;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("record write failed: {0}")]
    WriteFailure(String),
}

impl PersistenceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WriteFailure(_) => "write-failure",
        }
    }
}

impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        Self::WriteFailure(e.to_string())
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Cheap liveness probe used by the run pre-flight.
    async fn ready(&self) -> Result<(), PersistenceError>;

    /// Writes a record. Idempotent by `record.id`.
    async fn put(&self, record: &CandidateRecord) -> Result<(), PersistenceError>;
}

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn ready(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn put(&self, record: &CandidateRecord) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO candidates
                (id, name, email, phone, location, job_title, education,
                 score, parsed_text, skills, experience, approved, resume_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                location = EXCLUDED.location,
                job_title = EXCLUDED.job_title,
                education = EXCLUDED.education,
                score = EXCLUDED.score,
                parsed_text = EXCLUDED.parsed_text,
                skills = EXCLUDED.skills,
                experience = EXCLUDED.experience,
                approved = EXCLUDED.approved,
                resume_url = EXCLUDED.resume_url
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.phone)
        .bind(&record.location)
        .bind(&record.job_title)
        .bind(&record.education)
        .bind(i32::from(record.score))
        .bind(&record.parsed_text)
        .bind(&record.skills)
        .bind(i64::from(record.experience))
        .bind(record.approved)
        .bind(&record.resume_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
