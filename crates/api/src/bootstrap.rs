//! Startup bootstrap: deploy the bundled process model and open the
//! `get-time` worker.
//!
//! The original deployment fired these as hidden side effects of server
//! startup; here they are an explicit, testable step with a
//! configurable failure policy ([`ServerConfig::bootstrap_fatal`]).

use std::sync::Arc;

use flowbridge_core::variables;
use flowbridge_engine::api::JobApi;
use flowbridge_engine::client::EngineConnection;
use flowbridge_engine::dispatcher::{CommandDispatcher, DeployError};
use flowbridge_engine::types::ActivatedJob;
use flowbridge_engine::worker::{JobHandler, JobOutcome, JobWorker, WorkerConfig};

use crate::config::ServerConfig;

/// Process id declared by the bundled model artifact.
pub const BOOTSTRAP_PROCESS_ID: &str = "test-process";

/// File name of the bundled model artifact under the resources dir.
pub const BOOTSTRAP_ARTIFACT: &str = "test-process.bpmn";

/// Job type served by the bundled worker.
pub const GET_TIME_JOB_TYPE: &str = "get-time";

/// Completes every `get-time` job with the current UTC timestamp in a
/// `time` output variable.
pub struct GetTimeHandler;

#[async_trait::async_trait]
impl JobHandler for GetTimeHandler {
    async fn handle(&self, job: ActivatedJob) -> JobOutcome {
        tracing::info!(
            job_key = job.key,
            process_instance_key = job.process_instance_key,
            "Received get-time job",
        );

        let now = chrono::Utc::now().to_rfc3339();
        JobOutcome::Complete {
            variables: variables::from_pairs([("time".to_string(), serde_json::json!(now))]),
        }
    }
}

/// Errors that abort bootstrap (and, by default, startup).
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The bundled artifact could not be deployed.
    #[error("Bootstrap deploy failed: {0}")]
    Deploy(#[from] DeployError),
}

/// Deploy the bundled artifact and open the `get-time` worker.
///
/// A deploy failure aborts bootstrap when `bootstrap_fatal` is set;
/// otherwise it is logged and the worker is opened anyway, so the HTTP
/// surface can still serve `/status` against a healthy gateway.
pub async fn run(
    dispatcher: &CommandDispatcher,
    connection: &EngineConnection,
    config: &ServerConfig,
) -> Result<JobWorker, BootstrapError> {
    let artifact = config.resources_dir.join(BOOTSTRAP_ARTIFACT);

    match dispatcher.deploy(&artifact).await {
        Ok(result) => {
            tracing::info!(
                deployment_key = result.deployment_key,
                "Bootstrap deploy complete",
            );
        }
        Err(e) if config.bootstrap_fatal => return Err(e.into()),
        Err(e) => {
            tracing::error!(
                error = %e,
                "Bootstrap deploy failed; continuing without it (BOOTSTRAP_FATAL=false)",
            );
        }
    }

    let worker = JobWorker::open(
        connection.api() as Arc<dyn JobApi>,
        WorkerConfig::new(GET_TIME_JOB_TYPE),
        Arc::new(GetTimeHandler),
    );
    tracing::info!(job_type = GET_TIME_JOB_TYPE, "Bootstrap worker opened");

    Ok(worker)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use assert_matches::assert_matches;
    use axum::routing::get;
    use axum::{Json, Router};
    use flowbridge_engine::client::EngineClient;

    /// Stub gateway that only answers topology probes; every other
    /// endpoint 404s, so a bootstrap deploy against it fails.
    async fn spawn_topology_only_stub() -> String {
        let app = Router::new().route(
            "/v2/topology",
            get(|| async {
                Json(serde_json::json!({
                    "brokers": [],
                    "clusterSize": 1,
                    "partitionsCount": 1,
                    "replicationFactor": 1
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        address
    }

    fn test_config(address: &str, fatal: bool) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: vec![],
            request_timeout_secs: 5,
            engine_address: address.into(),
            engine_use_tls: false,
            auth_server_url: None,
            client_id: None,
            client_secret: None,
            // Points nowhere: the bundled artifact is missing on purpose.
            resources_dir: PathBuf::from("/nonexistent-resources"),
            bootstrap_fatal: fatal,
        }
    }

    #[tokio::test]
    async fn fatal_policy_aborts_on_deploy_failure() {
        let address = spawn_topology_only_stub().await;
        let conn = EngineClient::new(&address, false).connect().await.unwrap();
        let dispatcher = CommandDispatcher::new(conn.clone());
        let config = test_config(&address, true);

        let result = run(&dispatcher, &conn, &config).await;
        assert_matches!(
            result,
            Err(BootstrapError::Deploy(DeployError::ReadArtifact { .. }))
        );
    }

    #[tokio::test]
    async fn non_fatal_policy_still_opens_the_worker() {
        let address = spawn_topology_only_stub().await;
        let conn = EngineClient::new(&address, false).connect().await.unwrap();
        let dispatcher = CommandDispatcher::new(conn.clone());
        let config = test_config(&address, false);

        let worker = run(&dispatcher, &conn, &config)
            .await
            .expect("non-fatal bootstrap must not abort");
        worker.close().await;
    }

    #[tokio::test]
    async fn get_time_handler_emits_a_timestamp() {
        let job = ActivatedJob {
            key: 1,
            job_type: GET_TIME_JOB_TYPE.to_string(),
            process_instance_key: 2,
            retries: 3,
            variables: variables::empty(),
        };

        let outcome = GetTimeHandler.handle(job).await;
        let variables = assert_matches!(outcome, JobOutcome::Complete { variables } => variables);
        let time = variables["time"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(time).is_ok());
    }
}
