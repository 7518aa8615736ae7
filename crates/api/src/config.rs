use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development
/// against a plaintext engine gateway. In production, override via
/// environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`; `/start` waits
    /// synchronously for instance completion).
    pub request_timeout_secs: u64,
    /// Engine gateway address, host:port without scheme.
    pub engine_address: String,
    /// Whether to use transport encryption towards the gateway.
    pub engine_use_tls: bool,
    /// OAuth credentials for the gateway. All three must be present to
    /// enable authentication; otherwise the bridge connects plaintext.
    pub auth_server_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Directory holding deployable process model artifacts.
    pub resources_dir: PathBuf,
    /// Whether a failed bootstrap deploy aborts startup (default) or is
    /// logged and skipped so `/status` can still serve.
    pub bootstrap_fatal: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                  |
    /// |--------------------------|--------------------------|
    /// | `HOST`                   | `0.0.0.0`                |
    /// | `PORT`                   | `3000`                   |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`   | `60`                     |
    /// | `ENGINE_ADDRESS`         | `localhost:26500`        |
    /// | `ENGINE_USE_TLS`         | `false`                  |
    /// | `ENGINE_AUTH_SERVER_URL` | unset (plaintext)        |
    /// | `ENGINE_CLIENT_ID`       | unset (plaintext)        |
    /// | `ENGINE_CLIENT_SECRET`   | unset (plaintext)        |
    /// | `RESOURCES_DIR`          | `resources`              |
    /// | `BOOTSTRAP_FATAL`        | `true`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let engine_address =
            std::env::var("ENGINE_ADDRESS").unwrap_or_else(|_| "localhost:26500".into());

        let engine_use_tls = std::env::var("ENGINE_USE_TLS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let resources_dir =
            PathBuf::from(std::env::var("RESOURCES_DIR").unwrap_or_else(|_| "resources".into()));

        let bootstrap_fatal = std::env::var("BOOTSTRAP_FATAL")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            engine_address,
            engine_use_tls,
            auth_server_url: std::env::var("ENGINE_AUTH_SERVER_URL").ok(),
            client_id: std::env::var("ENGINE_CLIENT_ID").ok(),
            client_secret: std::env::var("ENGINE_CLIENT_SECRET").ok(),
            resources_dir,
            bootstrap_fatal,
        }
    }

    /// All three credential fields, when complete.
    ///
    /// Partial credentials count as absent: the bridge falls back to an
    /// unauthenticated connection rather than failing startup.
    pub fn credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.auth_server_url, &self.client_id, &self.client_secret) {
            (Some(url), Some(id), Some(secret)) => Some((url, id, secret)),
            _ => None,
        }
    }

    /// OAuth audience derived from the gateway address (host without
    /// the port).
    pub fn audience(&self) -> &str {
        self.engine_address
            .split(':')
            .next()
            .unwrap_or(&self.engine_address)
    }
}
