//! Typed DTOs for the engine gateway wire format.
//!
//! All wire structs use camelCase field names to match the gateway's
//! JSON. Responses are immutable snapshots: once returned they are never
//! mutated by this crate.

use flowbridge_core::types::{
    DeploymentKey, JobKey, ProcessDefinitionKey, ProcessInstanceKey,
};
use flowbridge_core::variables::Variables;
use serde::{Deserialize, Serialize};

/// Cluster membership and partition layout of the engine brokers.
///
/// Used as a lightweight liveness probe: if the gateway can answer a
/// topology request, the connection is healthy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerTopology {
    /// One entry per broker node in the cluster.
    pub brokers: Vec<BrokerInfo>,
    /// Configured cluster size.
    pub cluster_size: u32,
    /// Total number of partitions.
    pub partitions_count: u32,
    /// Configured replication factor.
    pub replication_factor: u32,
    /// Gateway software version, if the gateway reports one.
    #[serde(default)]
    pub gateway_version: Option<String>,
}

/// A single broker node and the partitions it hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerInfo {
    pub node_id: u32,
    pub host: String,
    pub port: u16,
    pub partitions: Vec<PartitionInfo>,
}

/// A partition hosted on a broker, with its replication role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    pub partition_id: u32,
    pub role: PartitionRole,
}

/// Role of a broker for one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionRole {
    Leader,
    Follower,
    Inactive,
}

/// Result of deploying one or more resources to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    /// Engine-assigned key for this deployment record.
    pub deployment_key: DeploymentKey,
    /// The process definitions created (or confirmed unchanged) by the
    /// deployment.
    pub processes: Vec<ProcessMetadata>,
}

/// Identity of one deployed process definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetadata {
    /// The process id declared inside the model artifact.
    pub process_id: String,
    /// Version assigned by the engine. Redeploying an unchanged artifact
    /// keeps the version; a changed artifact bumps it.
    pub version: u32,
    /// Engine-assigned key for this id/version pair.
    pub process_definition_key: ProcessDefinitionKey,
}

/// A created process instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstance {
    /// Engine-assigned key of this run.
    pub process_instance_key: ProcessInstanceKey,
    /// Id of the process definition this run executes.
    pub process_id: String,
    /// Version of the process definition this run executes.
    pub version: u32,
    /// Final output variables. Present only when the instance was
    /// started with synchronous completion; `None` for fire-and-forget
    /// starts.
    #[serde(default)]
    pub variables: Option<Variables>,
}

/// A job handed to a worker for the duration of one handler invocation.
///
/// Ownership transfers back to the engine when the worker reports an
/// outcome (or when the engine-side job timeout expires).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivatedJob {
    /// Engine-assigned job key.
    pub key: JobKey,
    /// The job type this job was activated for.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Key of the process instance the job belongs to.
    pub process_instance_key: ProcessInstanceKey,
    /// Remaining retries before the engine raises an incident.
    pub retries: i32,
    /// Input variables visible at the job's scope.
    #[serde(default)]
    pub variables: Variables,
}

/// Parameters of one job-activation (poll) request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateJobsRequest {
    /// Job type to activate.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Worker name, echoed back by the engine for observability.
    pub worker: String,
    /// Upper bound on jobs returned by this request.
    pub max_jobs_to_activate: usize,
    /// Engine-side job timeout in milliseconds: how long the engine
    /// waits for an outcome report before redelivering the job.
    pub timeout_millis: u64,
    /// Long-poll bound in milliseconds: how long the gateway may hold
    /// the request open waiting for jobs.
    pub request_timeout_millis: u64,
}
