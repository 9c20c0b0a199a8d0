use sqlx::PgPool;
use std::sync::Arc;

use crate::routes::auth::AuthVerifier;
use crate::services::queue::TaskQueue;
use crate::services::submission::SubmissionService;

/// Shared application state passed to all route handlers. Built once at
/// process start; handlers never construct their own store or queue clients.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<TaskQueue>,
    pub submission: Arc<SubmissionService>,
    pub auth: Arc<AuthVerifier>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        queue: Arc<TaskQueue>,
        submission: SubmissionService,
        auth: AuthVerifier,
    ) -> Self {
        Self {
            db,
            queue,
            submission: Arc::new(submission),
            auth: Arc::new(auth),
        }
    }
}
