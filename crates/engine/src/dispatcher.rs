//! One-shot command dispatch against the engine gateway.
//!
//! [`CommandDispatcher`] issues imperative requests (deploy a model,
//! start an instance) over a shared [`EngineConnection`]. Errors are
//! logged and returned to the caller; there is no local retry -- the
//! caller decides whether to fail the request or abort startup.

use std::path::Path;

use flowbridge_core::variables::Variables;

use crate::api::EngineApiError;
use crate::client::EngineConnection;
use crate::types::{DeploymentResult, ProcessInstance};

/// Dispatches one-shot commands over an engine connection.
#[derive(Clone)]
pub struct CommandDispatcher {
    conn: EngineConnection,
}

impl CommandDispatcher {
    pub fn new(conn: EngineConnection) -> Self {
        Self { conn }
    }

    /// Deploy a process model artifact from a local path.
    ///
    /// Reads the artifact, uploads it, and returns the identifiers of
    /// the created (or unchanged, for a redeployed identical artifact)
    /// process definitions.
    pub async fn deploy(&self, path: &Path) -> Result<DeploymentResult, DeployError> {
        let content = tokio::fs::read(path).await.map_err(|e| {
            let err = DeployError::ReadArtifact {
                path: path.display().to_string(),
                source: e,
            };
            tracing::error!(error = %err, "Failed to read deployment artifact");
            err
        })?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("resource")
            .to_string();

        let result = self
            .conn
            .api()
            .deploy_resource(&file_name, content)
            .await
            .map_err(|e| {
                let err = DeployError::from_api(e);
                tracing::error!(artifact = %file_name, error = %err, "Deployment failed");
                err
            })?;

        for process in &result.processes {
            tracing::info!(
                process_id = %process.process_id,
                version = process.version,
                "Deployed process model",
            );
        }

        Ok(result)
    }

    /// Start a new instance of the latest version of `process_id`.
    ///
    /// With `await_result` the call suspends until the instance
    /// completes and the returned [`ProcessInstance`] carries its output
    /// variables; otherwise it returns immediately with just the
    /// instance key.
    pub async fn start_instance(
        &self,
        process_id: &str,
        variables: Variables,
        await_result: bool,
    ) -> Result<ProcessInstance, StartError> {
        tracing::info!(process_id, await_result, "Starting process instance");

        let instance = self
            .conn
            .api()
            .create_instance(process_id, variables, await_result)
            .await
            .map_err(|e| {
                let err = StartError::from_api(process_id, e);
                tracing::error!(process_id, error = %err, "Failed to start process instance");
                err
            })?;

        tracing::info!(
            process_id,
            instance_key = instance.process_instance_key,
            version = instance.version,
            "Process instance started",
        );

        Ok(instance)
    }
}

/// Errors from a deploy command.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The local artifact could not be read.
    #[error("Cannot read artifact {path}: {source}")]
    ReadArtifact {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine rejected the artifact (malformed or invalid model).
    #[error("Engine rejected artifact ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The deploy call never reached the engine.
    #[error("Deploy failed: {0}")]
    Connection(EngineApiError),
}

impl DeployError {
    fn from_api(error: EngineApiError) -> Self {
        match error {
            EngineApiError::Gateway { status, body } if (400..500).contains(&status) => {
                DeployError::Rejected { status, body }
            }
            other => DeployError::Connection(other),
        }
    }
}

/// Errors from a start-instance command.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// No deployed process definition has this id.
    #[error("Unknown process id: {0}")]
    UnknownProcess(String),

    /// The instance terminated with an unhandled error in the engine.
    #[error("Instance of {process_id} failed ({status}): {body}")]
    InstanceFailed {
        process_id: String,
        status: u16,
        body: String,
    },

    /// The start call never reached the engine.
    #[error("Start failed: {0}")]
    Connection(EngineApiError),
}

impl StartError {
    fn from_api(process_id: &str, error: EngineApiError) -> Self {
        match error {
            EngineApiError::Gateway { status: 404, .. } => {
                StartError::UnknownProcess(process_id.to_string())
            }
            EngineApiError::Gateway { status, body } => StartError::InstanceFailed {
                process_id: process_id.to_string(),
                status,
                body,
            },
            other => StartError::Connection(other),
        }
    }
}
