//! HTTP client for the verification backend
//!
//! One `reqwest::Client` serves every endpoint. Only the connect timeout is
//! set on the client; the short calls add the request timeout per request so
//! the long-running verify stream is never cut off.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use verdict_core::{
    ChunkStream, ResultStore, SaveAck, SaveRecord, StoreError, TransportError,
    VerificationRequest, VerificationTransport, VerifierDescriptor,
};

use crate::config::HttpClientConfig;
use crate::error::{error_message, HttpError, Result};
use crate::perturb::PerturbationInput;

#[derive(Debug, Deserialize)]
struct RosterResponse {
    #[serde(default)]
    verifiers: Vec<VerifierDescriptor>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

/// Client for the verify, save, config, health and perturb endpoints
#[derive(Debug, Clone)]
pub struct HttpVerificationClient {
    config: HttpClientConfig,
    http: reqwest::Client,
}

impl HttpVerificationClient {
    /// Create a new client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| HttpError::Config(e.to_string()))?;

        Ok(HttpVerificationClient { config, http })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(HttpClientConfig::from_env())
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Fetch the configured verifiers.
    pub async fn fetch_roster(&self) -> Result<Vec<VerifierDescriptor>> {
        let url = self.config.url(&self.config.config_path);
        let response = self
            .http
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        let response = check_status(response).await?;
        let roster: RosterResponse = serde_json::from_slice(&response.bytes().await?)?;

        debug!(verifiers = roster.verifiers.len(), "fetched verifier roster");
        Ok(roster.verifiers)
    }

    /// `true` when the backend answers its health check with `status: ok`.
    pub async fn health(&self) -> Result<bool> {
        let url = self.config.url(&self.config.health_path);
        let response = self
            .http
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "health check failed");
            return Ok(false);
        }
        let health: HealthResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(health.status == "ok")
    }

    /// Ask the backend to generate a perturbation for `input`.
    pub async fn generate_perturbation(
        &self,
        input: &PerturbationInput,
    ) -> Result<VerificationRequest> {
        let url = self.config.url(&self.config.perturb_path);
        info!(
            class = %input.perturbation_class,
            intensity = %input.intensity,
            "requesting perturbation"
        );
        let response = self
            .http
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(input)
            .send()
            .await?;
        let response = check_status(response).await?;
        let generated: VerificationRequest = serde_json::from_slice(&response.bytes().await?)?;

        Ok(input.complete(generated))
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HttpError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

#[async_trait]
impl VerificationTransport for HttpVerificationClient {
    async fn open(
        &self,
        request: &VerificationRequest,
    ) -> std::result::Result<ChunkStream, TransportError> {
        let url = self.config.url(&self.config.verify_path);
        debug!(url = %url, request = %request.label(), "opening verification stream");

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::from_status(
                status.as_u16(),
                &error_message(&body),
            ));
        }
        if status == StatusCode::NO_CONTENT {
            return Err(TransportError::MissingBody);
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Read(e.to_string())))
            .boxed())
    }
}

#[async_trait]
impl ResultStore for HttpVerificationClient {
    async fn save(&self, record: &SaveRecord) -> std::result::Result<SaveAck, StoreError> {
        let url = self.config.url(&self.config.save_path);
        let response = self
            .http
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(record)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(StoreError::from_status(
                status.as_u16(),
                &error_message(&body),
            ));
        }

        let ack: SaveAck = serde_json::from_str(&body)
            .map_err(|e| StoreError::Request(format!("unreadable save acknowledgement: {e}")))?;
        info!(
            results = record.verification_results.len(),
            message = %ack.message,
            "save acknowledged"
        );
        ack.into_result()
    }
}
