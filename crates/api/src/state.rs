use std::sync::Arc;

use flowbridge_engine::client::EngineConnection;
use flowbridge_engine::dispatcher::CommandDispatcher;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable: the connection and dispatcher hold the gateway
/// API behind an `Arc`, and the single underlying HTTP client
/// multiplexes concurrent requests from handlers and worker loops.
#[derive(Clone)]
pub struct AppState {
    /// The one engine connection for this process.
    pub connection: EngineConnection,
    /// One-shot command dispatch (deploy, start instance).
    pub dispatcher: CommandDispatcher,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(connection: EngineConnection, config: Arc<ServerConfig>) -> Self {
        let dispatcher = CommandDispatcher::new(connection.clone());
        Self {
            connection,
            dispatcher,
            config,
        }
    }
}
