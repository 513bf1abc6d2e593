//! Stage runner backed by the analysis service HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use prism_core::config::stages::StageConfig;
use prism_core::error::{AppError, ErrorKind};
use prism_core::result::AppResult;
use prism_core::types::JobId;
use prism_entity::ErrorType;
use prism_recovery::codes;

use super::pipeline::StageRunner;
use crate::processor::ProcessorError;

#[derive(Debug, Deserialize)]
struct PipelineResponse {
    stages: Vec<StageInfo>,
}

#[derive(Debug, Deserialize)]
struct StageInfo {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    job_id: JobId,
    image_id: &'a str,
}

/// Error body the analysis service returns on failure.
#[derive(Debug, Default, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Calls `GET {base}/pipelines/{id}` for stage lists and
/// `POST {base}/pipelines/{id}/stages/{stage}/analyze` per image.
#[derive(Debug, Clone)]
pub struct HttpStageRunner {
    client: Client,
    base_url: String,
}

impl HttpStageRunner {
    /// Build a runner from the stage configuration.
    pub fn new(config: &StageConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    "Failed to build analysis service client",
                    e,
                )
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn error_from_response(response: reqwest::Response) -> ProcessorError {
        let status = response.status();
        let body: ServiceError = response.json().await.unwrap_or_default();
        let message = body.message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("analysis service error")
                .to_string()
        });

        let err = ProcessorError::new(format!("{} ({})", message, status.as_u16()))
            .with_meta("http_status", status.as_u16());
        match body.code.or_else(|| status_code(status).map(str::to_string)) {
            Some(code) => err.with_code(code),
            None => err,
        }
    }
}

/// Codes for statuses the message classifier cannot infer on its own.
fn status_code(status: StatusCode) -> Option<&'static str> {
    match status {
        StatusCode::SERVICE_UNAVAILABLE => Some(codes::SERVICE_UNAVAILABLE),
        StatusCode::PAYLOAD_TOO_LARGE => Some(codes::IMAGE_TOO_LARGE),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => Some(codes::UNSUPPORTED_FORMAT),
        _ => None,
    }
}

fn transport_error(err: reqwest::Error) -> ProcessorError {
    if err.is_timeout() {
        ProcessorError::new(format!("Analysis request timed out: {}", err))
            .with_code(codes::API_TIMEOUT)
            .with_type(ErrorType::Timeout)
    } else if err.is_connect() {
        ProcessorError::new(format!("Analysis service connection failed: {}", err))
            .with_code(codes::NETWORK_ERROR)
            .with_type(ErrorType::Network)
    } else {
        ProcessorError::new(format!("Analysis request failed: {}", err))
    }
}

#[async_trait]
impl StageRunner for HttpStageRunner {
    async fn stages(&self, pipeline_id: &str) -> Result<Vec<String>, ProcessorError> {
        let url = format!("{}/pipelines/{}", self.base_url, pipeline_id);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(
                    ProcessorError::new(format!("Pipeline {} not found", pipeline_id))
                        .with_code(codes::INVALID_PIPELINE),
                );
            }
            status if !status.is_success() => {
                return Err(Self::error_from_response(response).await);
            }
            _ => {}
        }

        let pipeline: PipelineResponse = response.json().await.map_err(|e| {
            ProcessorError::new(format!("Invalid pipeline definition: {}", e))
                .with_code(codes::INVALID_PIPELINE)
        })?;

        Ok(pipeline.stages.into_iter().map(|s| s.id).collect())
    }

    async fn run_stage(
        &self,
        job_id: JobId,
        pipeline_id: &str,
        stage_id: &str,
        image_id: &str,
    ) -> Result<(), ProcessorError> {
        let url = format!(
            "{}/pipelines/{}/stages/{}/analyze",
            self.base_url, pipeline_id, stage_id
        );
        debug!(job_id = %job_id, stage_id, image_id, "Running analysis stage");

        let response = self
            .client
            .post(&url)
            .json(&AnalyzeRequest { job_id, image_id })
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            status_code(StatusCode::SERVICE_UNAVAILABLE),
            Some(codes::SERVICE_UNAVAILABLE)
        );
        assert_eq!(
            status_code(StatusCode::PAYLOAD_TOO_LARGE),
            Some(codes::IMAGE_TOO_LARGE)
        );
        assert_eq!(status_code(StatusCode::TOO_MANY_REQUESTS), None);
    }

    #[test]
    fn test_base_url_trimmed() {
        let config = StageConfig {
            base_url: "http://analysis.local/api/".to_string(),
            ..StageConfig::default()
        };
        let runner = HttpStageRunner::new(&config).unwrap();
        assert_eq!(runner.base_url(), "http://analysis.local/api");
    }

    #[test]
    fn test_analyze_request_wire_format() {
        let job_id = JobId::new();
        let body = serde_json::to_value(AnalyzeRequest {
            job_id,
            image_id: "img-1",
        })
        .unwrap();
        assert_eq!(body["imageId"], "img-1");
        assert_eq!(body["jobId"], job_id.to_string());
    }
}
