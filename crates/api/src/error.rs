use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flowbridge_engine::client::ConnectionError;
use flowbridge_engine::dispatcher::{DeployError, StartError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the engine bridge error taxonomy and implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The engine gateway could not be reached or rejected credentials.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A deploy command failed.
    #[error(transparent)]
    Deploy(#[from] DeployError),

    /// A start-instance command failed.
    #[error(transparent)]
    Start(#[from] StartError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Connection(err) => {
                tracing::error!(error = %err, "Engine connection error");
                (
                    StatusCode::BAD_GATEWAY,
                    "ENGINE_UNAVAILABLE",
                    err.to_string(),
                )
            }

            AppError::Deploy(err) => match err {
                DeployError::ReadArtifact { .. } | DeployError::Rejected { .. } => {
                    (StatusCode::BAD_REQUEST, "DEPLOY_REJECTED", err.to_string())
                }
                DeployError::Connection(_) => {
                    tracing::error!(error = %err, "Deploy connection error");
                    (
                        StatusCode::BAD_GATEWAY,
                        "ENGINE_UNAVAILABLE",
                        err.to_string(),
                    )
                }
            },

            AppError::Start(err) => match err {
                StartError::UnknownProcess(_) => {
                    (StatusCode::NOT_FOUND, "UNKNOWN_PROCESS", err.to_string())
                }
                StartError::InstanceFailed { .. } => {
                    tracing::error!(error = %err, "Process instance failed");
                    (StatusCode::BAD_GATEWAY, "INSTANCE_FAILED", err.to_string())
                }
                StartError::Connection(_) => {
                    tracing::error!(error = %err, "Start connection error");
                    (
                        StatusCode::BAD_GATEWAY,
                        "ENGINE_UNAVAILABLE",
                        err.to_string(),
                    )
                }
            },
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
