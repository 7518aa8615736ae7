//! Key aliases for engine-assigned identifiers.
//!
//! The engine hands out 64-bit keys for every addressable entity
//! (deployments, process instances, jobs). Aliased here so signatures
//! say what a key identifies.

/// Key of a deployment record on the engine.
pub type DeploymentKey = i64;

/// Key of a single process instance (one run of a process definition).
pub type ProcessInstanceKey = i64;

/// Key of a deployed process definition (a specific id + version pair).
pub type ProcessDefinitionKey = i64;

/// Key of a job delegated to an external worker.
pub type JobKey = i64;
