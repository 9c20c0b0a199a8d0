use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string (task state store)
    pub database_url: String,

    /// Redis connection string for the task queue
    pub redis_url: String,

    /// Blob store bucket name
    pub s3_bucket: String,

    /// Blob store endpoint URL (S3-compatible)
    pub s3_endpoint: String,

    /// Blob store region
    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    /// Blob store access key ID
    pub s3_access_key: String,

    /// Blob store secret access key
    pub s3_secret_key: String,

    /// Cloudflare account ID (Workers AI detection backend)
    pub cf_account_id: String,

    /// Cloudflare Workers AI API token
    pub cf_api_token: String,

    /// HS256 key used to verify bearer tokens minted by the identity provider
    pub auth_jwt_secret: String,

    /// Number of polling loops the worker process runs
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Seconds a received message stays hidden before it is redelivered
    #[serde(default = "default_visibility_timeout_secs")]
    pub queue_visibility_timeout_secs: u64,

    /// Upper bound, in seconds, on a single blocking queue receive
    #[serde(default = "default_poll_wait_secs")]
    pub queue_poll_wait_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_s3_region() -> String {
    "auto".to_string()
}

fn default_worker_count() -> usize {
    1
}

fn default_visibility_timeout_secs() -> u64 {
    30
}

fn default_poll_wait_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
