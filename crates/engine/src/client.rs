//! Connection management for the engine gateway.
//!
//! [`EngineClient`] holds the connection configuration for a single
//! gateway. Call [`EngineClient::connect`] to validate reachability and
//! obtain a live [`EngineConnection`], which the dispatcher and worker
//! runtime share.

use std::sync::Arc;

use crate::api::{EngineApiError, GatewayApi};
use crate::auth::TokenProvider;
use crate::types::BrokerTopology;

/// Configuration handle for an engine gateway.
///
/// Stores the gateway address, transport-security flag, and an optional
/// token supplier. Create an [`EngineConnection`] by calling
/// [`connect`](Self::connect).
pub struct EngineClient {
    address: String,
    use_tls: bool,
    token_provider: Option<Arc<dyn TokenProvider>>,
}

/// A live, validated connection to an engine gateway.
///
/// One per configured address; construct it once at startup and clone
/// the handle into every component that talks to the engine. Cloning is
/// cheap (the gateway API is behind an `Arc`) and the underlying HTTP
/// client multiplexes concurrent requests.
#[derive(Clone)]
pub struct EngineConnection {
    /// Unique id for this connection, for log correlation.
    client_id: String,
    api: Arc<GatewayApi>,
}

impl std::fmt::Debug for EngineConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConnection")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl EngineClient {
    /// Create a new client targeting a gateway.
    ///
    /// * `address` - host:port of the gateway, without scheme.
    /// * `use_tls` - select `https` instead of `http`.
    pub fn new(address: impl Into<String>, use_tls: bool) -> Self {
        Self {
            address: address.into(),
            use_tls,
            token_provider: None,
        }
    }

    /// Attach a token supplier. Without one, requests go out
    /// unauthenticated.
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Base HTTP URL derived from the address and TLS flag.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{scheme}://{}", self.address)
    }

    /// Connect to the gateway.
    ///
    /// Issues a topology request to validate that the gateway is
    /// reachable and credentials (if any) are accepted. Fails with
    /// [`ConnectionError`] otherwise.
    pub async fn connect(&self) -> Result<EngineConnection, ConnectionError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let api = GatewayApi::new(self.base_url(), self.token_provider.clone());

        let topology = api
            .topology()
            .await
            .map_err(|e| ConnectionError::from_api(&self.address, e))?;

        tracing::info!(
            client_id = %client_id,
            brokers = topology.brokers.len(),
            partitions = topology.partitions_count,
            "Connected to engine gateway at {}",
            self.address,
        );

        Ok(EngineConnection {
            client_id,
            api: Arc::new(api),
        })
    }
}

impl EngineConnection {
    /// Unique id of this connection, for log correlation.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Shared gateway API handle.
    pub fn api(&self) -> Arc<GatewayApi> {
        Arc::clone(&self.api)
    }

    /// Query cluster topology as a health probe.
    pub async fn topology(&self) -> Result<BrokerTopology, ConnectionError> {
        self.api
            .topology()
            .await
            .map_err(|e| ConnectionError::from_api(self.api.base_url(), e))
    }
}

/// Errors establishing or probing a gateway connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The gateway could not be reached (network, DNS, TLS negotiation).
    #[error("Engine gateway unreachable at {address}: {reason}")]
    Unreachable { address: String, reason: String },

    /// The gateway rejected the credentials.
    #[error("Engine gateway rejected credentials: {0}")]
    Auth(String),

    /// The gateway answered with an error status.
    #[error("Engine gateway error ({status}): {body}")]
    Gateway { status: u16, body: String },
}

impl ConnectionError {
    fn from_api(address: &str, error: EngineApiError) -> Self {
        match error {
            EngineApiError::Request(e) => ConnectionError::Unreachable {
                address: address.to_string(),
                reason: e.to_string(),
            },
            EngineApiError::Auth(e) => ConnectionError::Auth(e.to_string()),
            EngineApiError::Gateway { status, body } if status == 401 || status == 403 => {
                ConnectionError::Auth(format!("status {status}: {body}"))
            }
            EngineApiError::Gateway { status, body } => {
                ConnectionError::Gateway { status, body }
            }
        }
    }
}
