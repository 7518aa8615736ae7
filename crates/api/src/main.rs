use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowbridge_api::bootstrap;
use flowbridge_api::config::ServerConfig;
use flowbridge_api::router::build_app_router;
use flowbridge_api::state::AppState;
use flowbridge_engine::auth::{OAuthTokenProvider, TokenProvider};
use flowbridge_engine::client::EngineClient;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "flowbridge_api=debug,flowbridge_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        engine = %config.engine_address,
        tls = config.engine_use_tls,
        "Loaded server configuration",
    );

    // --- Engine connection ---
    let mut client = EngineClient::new(&config.engine_address, config.engine_use_tls);
    match config.credentials() {
        Some((auth_server_url, client_id, client_secret)) => {
            let provider = OAuthTokenProvider::new(
                auth_server_url,
                client_id,
                client_secret,
                config.audience(),
            );
            client = client.with_token_provider(Arc::new(provider) as Arc<dyn TokenProvider>);
            tracing::info!("Engine credentials configured (OAuth client credentials)");
        }
        None => {
            tracing::info!("No engine credentials configured; connecting plaintext");
        }
    }

    let connection = client
        .connect()
        .await
        .expect("Failed to connect to engine gateway");

    // --- App state ---
    let config = Arc::new(config);
    let state = AppState::new(connection.clone(), Arc::clone(&config));

    // --- Bootstrap: deploy the bundled model, open the get-time worker ---
    let worker = bootstrap::run(&state.dispatcher, &connection, &config)
        .await
        .expect("Bootstrap failed");

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop polling; in-flight jobs finish or hit the engine-side timeout.
    worker.close().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
