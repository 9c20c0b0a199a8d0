mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::{middleware, routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use routes::auth::AuthVerifier;
use services::{queue::TaskQueue, storage::BlobStore, submission::SubmissionService};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing image-tasks API server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("image_tasks_submitted_total", "Total image tasks submitted");
    metrics::describe_counter!("image_tasks_completed_total", "Total image tasks completed");
    metrics::describe_counter!(
        "image_task_processing_failures_total",
        "Processing attempts that failed and were left for redelivery"
    );
    metrics::describe_histogram!(
        "image_task_processing_seconds",
        "Time to process one queued task"
    );
    metrics::describe_gauge!(
        "image_task_queue_depth",
        "Current number of pending messages in the task queue"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL state store");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize blob storage client
    tracing::info!("Initializing blob store client");
    let storage = BlobStore::new(
        &config.s3_bucket,
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .expect("Failed to initialize blob store");
    let storage = Arc::new(storage);

    // Initialize Redis task queue
    tracing::info!("Connecting to Redis task queue");
    let queue = TaskQueue::new(
        &config.redis_url,
        Duration::from_secs(config.queue_visibility_timeout_secs),
    )
    .expect("Failed to initialize task queue");
    let queue = Arc::new(queue);

    let submission = SubmissionService::new(db_pool.clone(), storage, queue.clone());
    let auth = AuthVerifier::new(&config.auth_jwt_secret);

    // Create shared application state
    let state = AppState::new(db_pool, queue, submission, auth);

    // Task endpoints require a bearer credential from the identity provider
    let api = Router::new()
        .route("/api/v1/images", post(routes::submit::submit_image))
        .route("/api/v1/results/{task_id}", get(routes::results::get_result))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::require_bearer,
        ));

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(api)
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    tracing::info!("Starting image-tasks on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
