use image_tasks::{
    config::AppConfig,
    db,
    services::{detector::WorkersAiDetector, queue::TaskQueue, storage::BlobStore},
    worker::{self, Worker},
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting image classification worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL state store");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize shared clients once per process
    tracing::info!("Initializing services");
    let storage = Arc::new(
        BlobStore::new(
            &config.s3_bucket,
            &config.s3_endpoint,
            &config.s3_region,
            &config.s3_access_key,
            &config.s3_secret_key,
        )
        .expect("Failed to initialize blob store"),
    );

    let queue = Arc::new(
        TaskQueue::new(
            &config.redis_url,
            Duration::from_secs(config.queue_visibility_timeout_secs),
        )
        .expect("Failed to initialize task queue"),
    );

    // One detector handle per process, shared by every polling loop
    let detector = Arc::new(WorkersAiDetector::new(
        &config.cf_account_id,
        &config.cf_api_token,
    ));

    let poll_wait = Duration::from_secs(config.queue_poll_wait_secs);

    // Liveness/queue-depth reporting runs beside the polling loops
    tokio::spawn(worker::heartbeat(queue.clone()));

    tracing::info!(workers = config.worker_count, "Worker pool ready, starting polling loops");

    let mut handles = Vec::with_capacity(config.worker_count);
    for id in 0..config.worker_count {
        let worker = Worker::new(
            id,
            db_pool.clone(),
            storage.clone(),
            queue.clone(),
            detector.clone(),
            poll_wait,
        );
        handles.push(tokio::spawn(worker.run()));
    }

    for handle in handles {
        let _ = handle.await;
    }
}
