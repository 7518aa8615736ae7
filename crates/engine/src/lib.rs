//! Client bridge to a remote workflow engine.
//!
//! Provides the connection handle, gateway REST wrappers, one-shot
//! command dispatch (deploy, start instance, topology), and the polling
//! job-worker runtime. The engine itself -- process execution, state,
//! job distribution -- lives on the other side of the gateway; this
//! crate only speaks to it.

pub mod api;
pub mod auth;
pub mod client;
pub mod dispatcher;
pub mod types;
pub mod worker;
