//! HTTP front-end over the engine bridge.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! bootstrap) so integration tests and the binary entrypoint can both
//! access them.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod router;
pub mod routes;
pub mod state;
