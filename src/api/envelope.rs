//! JSON envelopes for orderscope responses.
//!
//! A successful call returns `{"data": .., "meta": ..}`. A failed call returns
//! `{"error": {"code", "message"}, "meta": ..}` where `code` is the
//! [`AnalysisError::code`] of the failing stage, or `BAD_REQUEST` /
//! `INTERNAL_ERROR` for request and server problems.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::error::AnalysisError;

/// Stamped on every envelope: response time and crate version.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
    pub version: &'static str,
}

impl ResponseMeta {
    fn now() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with `data` wrapped.
    pub fn ok(data: T) -> Response {
        let meta = ResponseMeta::now();
        (StatusCode::OK, Json(Self { data, meta })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

/// 503 when no decision artifact is deployed for the class, 422 for
/// anything wrong with the uploaded recording.
fn status_for(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl ApiErrorResponse {
    fn respond(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
        let error = ErrorDetail {
            code: code.to_owned(),
            message: message.into(),
        };
        let meta = ResponseMeta::now();
        (status, Json(Self { error, meta })).into_response()
    }

    /// Missing or unusable query parameters.
    pub fn bad_request(message: impl Into<String>) -> Response {
        Self::respond(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// The blocking analysis task died.
    pub fn internal(message: impl Into<String>) -> Response {
        Self::respond(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// A pipeline stage rejected the recording.
    pub fn analysis(err: &AnalysisError) -> Response {
        Self::respond(status_for(err), err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_report_wrapped_with_version() {
        let resp = ApiResponse::ok(serde_json::json!({ "verdict": "OK" }));
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_of(resp).await;
        assert_eq!(body["data"]["verdict"], "OK");
        assert_eq!(body["meta"]["version"], env!("CARGO_PKG_VERSION"));
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_missing_model_is_503_bad_recording_is_422() {
        let resp = ApiErrorResponse::analysis(&AnalysisError::ModelUnavailable {
            machine_class: "pump".into(),
        });
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_of(resp).await;
        assert_eq!(body["error"]["code"], "MODEL_UNAVAILABLE");
        assert!(body["error"]["message"].as_str().unwrap().contains("pump"));

        for err in [
            AnalysisError::InsufficientData { needed: 512, available: 10 },
            AnalysisError::SignalGap { at: 3.0, duration: 0.5, threshold: 0.001 },
        ] {
            let resp = ApiErrorResponse::analysis(&err);
            assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(body_of(resp).await["error"]["code"], err.code());
        }
    }
}
