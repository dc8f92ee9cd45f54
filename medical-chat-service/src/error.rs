use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The client sent something we cannot work with. Never reaches a collaborator.
    #[error("invalid request: {0}")]
    InvalidRequestShape(String),

    #[error("collaborator call failed: {0}")]
    CollaboratorFailure(#[source] anyhow::Error),

    #[error("collaborator returned an unusable response: {0}")]
    MalformedCollaboratorResponse(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    /// Short name of the failure, surfaced to clients inside fallback payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidRequestShape(_) => "InvalidRequestShape",
            ServiceError::CollaboratorFailure(_) => "CollaboratorFailure",
            ServiceError::MalformedCollaboratorResponse(_) => "MalformedCollaboratorResponse",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequestShape(_) => StatusCode::BAD_REQUEST,
            ServiceError::CollaboratorFailure(_)
            | ServiceError::MalformedCollaboratorResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing description. Keeps the root cause but not the whole chain.
    pub fn detail(&self) -> String {
        match self {
            ServiceError::InvalidRequestShape(msg)
            | ServiceError::MalformedCollaboratorResponse(msg) => msg.clone(),
            ServiceError::CollaboratorFailure(e) => e.to_string(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        ServiceError::MalformedCollaboratorResponse(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        ServiceError::InvalidRequestShape(msg.into())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(e: anyhow::Error) -> Self {
        ServiceError::CollaboratorFailure(e)
    }
}

/// Logs the error with its full source chain for operators.
pub fn log_failure(route: &str, err: &ServiceError) {
    match err {
        ServiceError::CollaboratorFailure(source) => {
            tracing::error!(
                route = %route,
                kind = err.kind(),
                error = %err,
                "Collaborator failure: {:?}",
                source
            );
        }
        ServiceError::InvalidRequestShape(_) => {
            tracing::warn!(route = %route, kind = err.kind(), error = %err, "Rejected request");
        }
        ServiceError::MalformedCollaboratorResponse(_) => {
            tracing::error!(route = %route, kind = err.kind(), error = %err, "Request failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServiceError::invalid("no message").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::malformed("not an object").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::from(anyhow::anyhow!("timeout")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_log_failure_covers_every_kind() {
        let errors = [
            ServiceError::invalid("'message' must be a string"),
            ServiceError::malformed("not an object"),
            ServiceError::from(anyhow::anyhow!("timeout")),
        ];
        for err in &errors {
            log_failure("/gemini-interactive", err);
        }
        assert_eq!(errors[0].status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_detail_uses_root_message() {
        let err = ServiceError::from(anyhow::anyhow!("connection refused"));
        assert_eq!(err.kind(), "CollaboratorFailure");
        assert_eq!(err.detail(), "connection refused");
    }
}
