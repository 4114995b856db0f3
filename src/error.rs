use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::pipeline::PipelineError;
use crate::pipeline::extract::ExtractError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unreadable PDF: {0}")]
    UnreadablePdf(String),

    #[error("Analysis failed")]
    AnalysisFailed,

    #[error("Render error: {0}")]
    Render(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MissingFile => AppError::MissingFile,
            PipelineError::Extraction(e @ ExtractError::Parse(_)) => {
                AppError::UnreadablePdf(e.to_string())
            }
            // Reading our own staged copy is a server fault, not a bad upload.
            PipelineError::Extraction(e @ ExtractError::Read { .. }) => {
                AppError::Internal(e.to_string())
            }
            PipelineError::AnalysisFailed => AppError::AnalysisFailed,
            PipelineError::Render(e) => AppError::Render(e.to_string()),
            e @ PipelineError::Scratch { .. } => AppError::Internal(e.to_string()),
        }
    }
}

fn get_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::MissingFile => (StatusCode::BAD_REQUEST, "No file uploaded".to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Uploaded file is too large".to_string(),
            ),
            AppError::UnreadablePdf(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Uploaded file is not a readable PDF".to_string(),
            ),
            AppError::AnalysisFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to analyze PDF content".to_string(),
            ),
            AppError::Render(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate report PDF".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::UnreadablePdf(msg) => tracing::warn!(error = %msg, "Unreadable PDF upload"),
            AppError::AnalysisFailed => tracing::error!("Report analysis failed"),
            AppError::Render(msg) => tracing::error!(error = %msg, "Report render error"),
            AppError::Internal(msg) => tracing::error!(error = %msg, "Internal error"),
            _ => {}
        }

        let (status, error_message) = self.status_and_message();

        let body = if let Some(trace_id) = get_trace_id() {
            json!({
                "error": error_message,
                "status": status.as_u16(),
                "trace_id": trace_id,
            })
        } else {
            json!({
                "error": error_message,
                "status": status.as_u16(),
            })
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (AppError::MissingFile, StatusCode::BAD_REQUEST),
            (
                AppError::Validation("test".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::NotFound("test".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::PayloadTooLarge("test".to_string()),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                AppError::UnreadablePdf("test".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AppError::AnalysisFailed, StatusCode::INTERNAL_SERVER_ERROR),
            (
                AppError::Render("test".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Internal("test".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected_status) in test_cases {
            assert_eq!(error.status_and_message().0, expected_status);
            assert_eq!(error.into_response().status(), expected_status);
        }
    }

    #[test]
    fn test_public_messages_hide_causes() {
        let (_, msg) = AppError::Internal("disk full at /tmp/x".to_string()).status_and_message();
        assert_eq!(msg, "Internal server error");

        let (_, msg) = AppError::UnreadablePdf("xref broken".to_string()).status_and_message();
        assert_eq!(msg, "Uploaded file is not a readable PDF");
    }

    #[test]
    fn test_pipeline_error_mapping() {
        assert!(matches!(
            AppError::from(PipelineError::MissingFile),
            AppError::MissingFile
        ));
        assert!(matches!(
            AppError::from(PipelineError::AnalysisFailed),
            AppError::AnalysisFailed
        ));
        assert!(matches!(
            AppError::from(PipelineError::Extraction(ExtractError::Parse("bad".into()))),
            AppError::UnreadablePdf(_)
        ));
        assert!(matches!(
            AppError::from(PipelineError::Extraction(ExtractError::Read {
                path: "/tmp/temp_input_x.pdf".into(),
                source: std::io::Error::other("permission denied"),
            })),
            AppError::Internal(_)
        ));
        assert!(matches!(
            AppError::from(PipelineError::Scratch {
                path: "/tmp/x".into(),
                source: std::io::Error::other("disk full"),
            }),
            AppError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn test_response_body_shape() {
        let response = AppError::MissingFile.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "No file uploaded");
        assert_eq!(value["status"], 400);
    }
}
