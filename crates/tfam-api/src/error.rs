use thiserror::Error;
use tfam_core::CoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl ApiError {
    /// HTTP status code the error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) => 400,
            ApiError::TaskNotFound(_) => 404,
            ApiError::Internal(_) => 500,
            ApiError::Core(e) => match e {
                CoreError::TaskNotFound { .. } | CoreError::UnknownContainer(_) => 404,
                CoreError::ContainerAlreadyBound(_)
                | CoreError::NoStandbyAvailable(_)
                | CoreError::SlotEmpty { .. } => 409,
                CoreError::NoMatchingJob { .. }
                | CoreError::IndexOutOfRange { .. }
                | CoreError::InvalidConfig(_)
                | CoreError::Model(_) => 400,
                CoreError::Store(_)
                | CoreError::Serialization(_)
                | CoreError::ResourceManager(_)
                | CoreError::NodeManager(_) => 500,
            },
        }
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
