use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    gatehouse_protocol::ErrorBody,
    tracing::{debug, warn},
};

/// Registry-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("gateway {0} is already registered")]
    AlreadyRegistered(String),
    #[error("no gateway registered with id {0}")]
    NotFound(String),
}

/// Configuration-store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no configuration found for gateway id {0}")]
    NotFound(String),
}

/// Outcome classes surfaced to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
}

impl ServiceError {
    /// HTTP status for this outcome.
    ///
    /// A gateway that is unknown is the caller's problem (404); a gateway
    /// with no configuration is ours (500).
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Registry(RegistryError::AlreadyRegistered(_)) | Self::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            },
            Self::Registry(RegistryError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Configuration(ConfigurationError::NotFound(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            debug!(error = %self, "request rejected");
        } else {
            warn!(error = %self, "request failed");
        }
        (self.status_code(), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}
