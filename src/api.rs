use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Query string of `GET /bookmarks`. Values stay raw so that a bad number
/// is answered with an envelope instead of an extractor rejection.
#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    pub after_id: Option<String>,
    pub limit: Option<String>,
}

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// The body every endpoint answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub data: Value,
    pub status: Status,
    pub error_message: String,
}

#[derive(Debug, Clone)]
pub struct APIResponse {
    body: Envelope,
    http_status: StatusCode,
    public: bool,
}

impl APIResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self::success_with_status(data, StatusCode::OK)
    }

    pub fn created<T: Serialize>(data: T) -> Self {
        Self::success_with_status(data, StatusCode::CREATED)
    }

    pub fn success_with_status<T: Serialize>(data: T, http_status: StatusCode) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => APIResponse {
                body: Envelope {
                    data,
                    status: Status::Success,
                    error_message: String::new(),
                },
                http_status,
                public: true,
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response payload");
                Self::internal_error()
            }
        }
    }

    pub fn error(msg: &str) -> Self {
        Self::error_with_status(msg, StatusCode::BAD_REQUEST)
    }

    pub fn error_with_status(msg: &str, http_status: StatusCode) -> Self {
        APIResponse {
            body: Envelope {
                data: Value::Object(Map::new()),
                status: Status::Error,
                error_message: msg.to_owned(),
            },
            http_status,
            public: true,
        }
    }

    pub fn internal_error() -> Self {
        Self::error_with_status(INTERNAL_ERROR_MESSAGE, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Drops the `Access-Control-Allow-Origin` header from the rendered response.
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.http_status
    }

    pub fn body(&self) -> &Envelope {
        &self.body
    }
}

impl IntoResponse for APIResponse {
    fn into_response(self) -> Response {
        let bytes = match serde_json::to_vec(&self.body) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode response envelope");
                return (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).into_response();
            }
        };

        let mut response = (self.http_status, bytes).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
        if self.public {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn render(resp: APIResponse) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = resp.into_response();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn success_envelope() {
        let (status, headers, body) = render(APIResponse::success(json!({"a": 1}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], CONTENT_TYPE_JSON);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(body, json!({"data": {"a": 1}, "status": "success", "error_message": ""}));
    }

    #[tokio::test]
    async fn created_uses_201() {
        let (status, _, body) = render(APIResponse::created(json!([]))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn error_envelope_defaults_to_400() {
        let (status, _, body) = render(APIResponse::error("nope")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"data": {}, "status": "error", "error_message": "nope"}));
    }

    #[tokio::test]
    async fn error_with_custom_status() {
        let (status, _, body) =
            render(APIResponse::error_with_status("gone", StatusCode::NOT_FOUND)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_message"], "gone");
    }

    #[tokio::test]
    async fn internal_error_is_generic() {
        let (status, _, body) = render(APIResponse::internal_error()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error_message"], INTERNAL_ERROR_MESSAGE);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn private_response_has_no_cors_header() {
        let (_, headers, _) = render(APIResponse::success(json!({})).private()).await;
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(headers[header::CONTENT_TYPE], CONTENT_TYPE_JSON);
    }
}
