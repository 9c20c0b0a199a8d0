use std::future::Future;

use reqwest::Client;
use serde::Deserialize;

/// Workers AI object detection model.
const DETECTION_MODEL: &str = "@cf/facebook/detr-resnet-50";

/// One detected object: a class name and the model's confidence in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub score: f32,
}

/// Object detection capability.
///
/// The pipeline only depends on this single method, so the backing model can
/// be swapped out and tests can substitute deterministic doubles.
pub trait Detector: Send + Sync {
    fn detect(
        &self,
        image: &[u8],
    ) -> impl Future<Output = Result<Vec<Detection>, DetectError>> + Send;
}

/// Detector backed by the Cloudflare Workers AI DETR model.
pub struct WorkersAiDetector {
    http: Client,
    account_id: String,
    api_token: String,
}

#[derive(Deserialize)]
struct DetrResponse {
    result: Vec<DetrDetection>,
}

#[derive(Deserialize)]
struct DetrDetection {
    label: String,
    score: f32,
}

impl WorkersAiDetector {
    pub fn new(account_id: &str, api_token: &str) -> Self {
        Self {
            http: Client::new(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
        }
    }
}

impl Detector for WorkersAiDetector {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, DetectError> {
        let url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
            self.account_id, DETECTION_MODEL
        );

        let request_body = serde_json::json!({ "image": image });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DetectError::Api(response.status()));
        }

        let parsed: DetrResponse = response.json().await?;

        Ok(parsed
            .result
            .into_iter()
            .map(|d| Detection {
                label: d.label,
                score: d.score,
            })
            .collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Workers AI returned error status: {0}")]
    Api(reqwest::StatusCode),
}
