use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::APIResponse;
use crate::model::ValidationError;

/// Every way a bookmark handler can fail. Rendered as an error envelope.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    /// An extractor refused the request before the handler could look at it.
    #[error("{1}")]
    Rejected(StatusCode, String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        HandlerError::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        use HandlerError::*;
        match self {
            BadRequest(_) => StatusCode::BAD_REQUEST,
            NotFound(_) => StatusCode::NOT_FOUND,
            Forbidden(_) => StatusCode::FORBIDDEN,
            Rejected(status, _) => *status,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for HandlerError {
    fn from(error: ValidationError) -> Self {
        HandlerError::BadRequest(format!("Invalid bookmark data: {}", error))
    }
}

impl From<BytesRejection> for HandlerError {
    fn from(rejection: BytesRejection) -> Self {
        HandlerError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<HandlerError> for APIResponse {
    fn from(error: HandlerError) -> Self {
        match error {
            HandlerError::Internal(e) => {
                let source: &(dyn std::error::Error + 'static) = e.as_ref();
                tracing::error!(error = %crate::unpack_error(source), "request failed");
                APIResponse::internal_error()
            }
            other => APIResponse::error_with_status(&other.to_string(), other.status()),
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        APIResponse::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;

    #[test]
    fn statuses() {
        assert_eq!(HandlerError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(HandlerError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(HandlerError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            HandlerError::Rejected(StatusCode::PAYLOAD_TOO_LARGE, "x".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            HandlerError::from(anyhow::anyhow!("disk on fire")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_error_message() {
        let err = ValidationError {
            missing: vec![Field::Url],
            ..Default::default()
        };
        let resp = APIResponse::from(HandlerError::from(err));
        assert_eq!(resp.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.body().error_message, "Invalid bookmark data: missing fields: [url]");
    }

    #[test]
    fn internal_error_hides_detail() {
        let resp = APIResponse::from(HandlerError::from(anyhow::anyhow!("secret detail")));
        assert_eq!(resp.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.body().error_message, "Internal server error");
    }
}
