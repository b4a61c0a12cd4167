mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod routes;
mod screening;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::screening::extraction::{CloudExtractionBackend, PdfTextBackend};
use crate::screening::failure_log::RedisFailureLog;
use crate::screening::orchestrator::{BatchOrchestrator, Collaborators};
use crate::screening::records::PgRecordStore;
use crate::screening::storage::S3ObjectStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Screener API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;

    // Initialize Redis (failure log)
    let redis = redis::Client::open(config.redis_url.clone())?;
    let redis_conn = redis.get_multiplexed_tokio_connection().await?;
    info!("Redis connection established");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    if llm.has_api_key() {
        info!("LLM client initialized (model: {})", llm_client::MODEL);
    } else {
        warn!("ANTHROPIC_API_KEY is not set; screening runs will report Service Unavailable");
    }

    let collaborators = Collaborators {
        primary_extractor: Arc::new(PdfTextBackend),
        fallback_extractor: Arc::new(CloudExtractionBackend::new(llm.clone())),
        evaluator: Arc::new(llm),
        object_store: Arc::new(S3ObjectStore::new(
            s3,
            config.s3_bucket.clone(),
            config.s3_public_url.clone(),
        )),
        record_store: Arc::new(PgRecordStore::new(db)),
        failure_log: Arc::new(RedisFailureLog::new(redis_conn)),
    };

    info!(
        "Screening settings: batch size {}, cooldown {}s, min {} chars",
        config.screening.batch_size,
        config.screening.cooldown.as_secs(),
        config.screening.min_extracted_chars
    );

    let max_upload_bytes = config.screening.max_upload_bytes;

    // Build app state
    let state = AppState {
        orchestrator: Arc::new(BatchOrchestrator::new(
            collaborators,
            config.screening.clone(),
        )),
    };

    // Build router
    let app = build_router(state, max_upload_bytes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "screener-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
