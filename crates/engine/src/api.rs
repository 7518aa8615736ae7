//! REST wrappers for the engine gateway HTTP endpoints.
//!
//! Wraps the gateway API (deployment, instance creation, topology, job
//! activation and outcome reports) using [`reqwest`]. One instance per
//! connection; the inner `reqwest::Client` multiplexes concurrent
//! requests, so the dispatcher and all worker poll loops share it
//! without client-side locking.

use std::sync::Arc;

use flowbridge_core::types::JobKey;
use flowbridge_core::variables::Variables;
use serde::Deserialize;

use crate::auth::{AuthError, TokenProvider};
use crate::types::{
    ActivateJobsRequest, ActivatedJob, BrokerTopology, DeploymentResult, ProcessInstance,
};

/// HTTP client for a single engine gateway.
pub struct GatewayApi {
    client: reqwest::Client,
    base_url: String,
    token_provider: Option<Arc<dyn TokenProvider>>,
}

/// Errors from the gateway REST layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway returned a non-2xx status code.
    #[error("Gateway error ({status}): {body}")]
    Gateway {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Token acquisition for the call failed.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
}

/// Wire shape of the gateway's job-activation response.
#[derive(Deserialize)]
struct ActivateJobsResponse {
    #[serde(default)]
    jobs: Vec<ActivatedJob>,
}

impl GatewayApi {
    /// Create a new API client for a gateway.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `http://gateway:26500`.
    /// * `token_provider` - invoked per call when present; `None` means
    ///   unauthenticated plaintext requests.
    pub fn new(base_url: String, token_provider: Option<Arc<dyn TokenProvider>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            token_provider,
        }
    }

    /// Base HTTP URL of the gateway.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query cluster topology.
    ///
    /// Sends a `GET /v2/topology` request. Cheap, read-only; used as the
    /// connection health probe.
    pub async fn topology(&self) -> Result<BrokerTopology, EngineApiError> {
        let request = self
            .authorize(self.client.get(format!("{}/v2/topology", self.base_url)))
            .await?;
        Self::parse_response(request.send().await?).await
    }

    /// Upload a resource artifact for deployment.
    ///
    /// Sends a `POST /v2/deployments` multipart request carrying the
    /// artifact bytes. The artifact format is opaque to this client; the
    /// engine validates it.
    pub async fn deploy_resource(
        &self,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<DeploymentResult, EngineApiError> {
        let part = reqwest::multipart::Part::bytes(content).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("resources", part);

        let request = self
            .authorize(
                self.client
                    .post(format!("{}/v2/deployments", self.base_url))
                    .multipart(form),
            )
            .await?;
        Self::parse_response(request.send().await?).await
    }

    /// Create a process instance of the latest version of `process_id`.
    ///
    /// Sends a `POST /v2/process-instances` request. With
    /// `await_completion` the gateway holds the request open until the
    /// instance finishes and includes its output variables in the
    /// response.
    pub async fn create_instance(
        &self,
        process_id: &str,
        variables: Variables,
        await_completion: bool,
    ) -> Result<ProcessInstance, EngineApiError> {
        let body = serde_json::json!({
            "processId": process_id,
            "variables": variables,
            "awaitCompletion": await_completion,
        });

        let request = self
            .authorize(
                self.client
                    .post(format!("{}/v2/process-instances", self.base_url))
                    .json(&body),
            )
            .await?;
        Self::parse_response(request.send().await?).await
    }

    // ---- private helpers ----

    /// Attach a bearer token when a provider is configured.
    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, EngineApiError> {
        match &self.token_provider {
            Some(provider) => {
                let token = provider.supply().await?;
                Ok(request.bearer_auth(token))
            }
            None => Ok(request),
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`EngineApiError::Gateway`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, EngineApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineApiError::Gateway {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), EngineApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Job-facing subset of the gateway API.
///
/// The worker runtime depends on this trait rather than on
/// [`GatewayApi`] directly so tests can drive it with a fake engine
/// double.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    /// Poll for jobs of a type. May long-poll up to the request timeout.
    async fn activate_jobs(
        &self,
        request: &ActivateJobsRequest,
    ) -> Result<Vec<ActivatedJob>, EngineApiError>;

    /// Report successful completion with output variables.
    async fn complete_job(
        &self,
        job_key: JobKey,
        variables: Variables,
    ) -> Result<(), EngineApiError>;

    /// Report a recoverable failure, leaving `retries` attempts.
    async fn fail_job(
        &self,
        job_key: JobKey,
        retries: i32,
        error_message: &str,
    ) -> Result<(), EngineApiError>;

    /// Raise a business error for the engine to route via an error
    /// boundary event.
    async fn throw_error(
        &self,
        job_key: JobKey,
        error_code: &str,
        error_message: &str,
    ) -> Result<(), EngineApiError>;
}

#[async_trait::async_trait]
impl JobApi for GatewayApi {
    async fn activate_jobs(
        &self,
        request: &ActivateJobsRequest,
    ) -> Result<Vec<ActivatedJob>, EngineApiError> {
        let req = self
            .authorize(
                self.client
                    .post(format!("{}/v2/jobs/activation", self.base_url))
                    .json(request),
            )
            .await?;
        let response: ActivateJobsResponse = Self::parse_response(req.send().await?).await?;
        Ok(response.jobs)
    }

    async fn complete_job(
        &self,
        job_key: JobKey,
        variables: Variables,
    ) -> Result<(), EngineApiError> {
        let body = serde_json::json!({ "variables": variables });
        let req = self
            .authorize(
                self.client
                    .post(format!("{}/v2/jobs/{job_key}/completion", self.base_url))
                    .json(&body),
            )
            .await?;
        Self::check_status(req.send().await?).await
    }

    async fn fail_job(
        &self,
        job_key: JobKey,
        retries: i32,
        error_message: &str,
    ) -> Result<(), EngineApiError> {
        let body = serde_json::json!({
            "retries": retries,
            "errorMessage": error_message,
        });
        let req = self
            .authorize(
                self.client
                    .post(format!("{}/v2/jobs/{job_key}/failure", self.base_url))
                    .json(&body),
            )
            .await?;
        Self::check_status(req.send().await?).await
    }

    async fn throw_error(
        &self,
        job_key: JobKey,
        error_code: &str,
        error_message: &str,
    ) -> Result<(), EngineApiError> {
        let body = serde_json::json!({
            "errorCode": error_code,
            "errorMessage": error_message,
        });
        let req = self
            .authorize(
                self.client
                    .post(format!("{}/v2/jobs/{job_key}/error", self.base_url))
                    .json(&body),
            )
            .await?;
        Self::check_status(req.send().await?).await
    }
}
