use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::pipeline::{AnalysisResponse, Upload};
use crate::test_type::TestType;

const FILE_FIELD: &str = "file";

pub async fn analyze_pdf(
    State(state): State<AppState>,
    Path(test_type): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<AnalysisResponse>> {
    let test_type: TestType = test_type
        .parse()
        .map_err(|_| AppError::NotFound(format!("Unknown test type '{test_type}'")))?;

    run(&state, test_type, multipart).await
}

/// Single-type endpoint kept for existing clients; always a blood test.
pub async fn analyze_default_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<AnalysisResponse>> {
    run(&state, TestType::BloodTest, multipart).await
}

async fn run(
    state: &AppState,
    test_type: TestType,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<AnalysisResponse>> {
    let upload = read_upload(multipart).await?;
    let response = state.pipeline.handle(test_type, upload).await?;
    Ok(Json(response))
}

/// Returns the first `file` part. A body that is not multipart counts as no file.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Option<Upload>> {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            tracing::debug!(reason = %rejection.body_text(), "Request is not multipart");
            return Ok(None);
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Some(Upload { file_name, bytes }));
    }

    Ok(None)
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::Validation(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use axum::{
        Router,
        body::Body,
        http::{Request, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::pipeline::fakes::{
        FakeAnalyzer, FakeExtractor, FakeRenderer, FakeStore, Harness, pipeline_with,
        pipeline_with_renderer,
    };
    use crate::routes::create_router;

    const BOUNDARY: &str = "X-MEDICAL-REPORT-BOUNDARY";

    fn app(harness: &Harness) -> Router {
        app_with(harness, Config::default())
    }

    fn app_with(harness: &Harness, config: Config) -> Router {
        create_router(AppState {
            config,
            pipeline: harness.pipeline.clone(),
        })
    }

    fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn worked_example() -> Harness {
        pipeline_with(
            FakeStore::ok(),
            FakeExtractor::returning("Hemoglobin: 12.5 g/dL"),
            FakeAnalyzer::returning("1. Hemoglobin normal."),
        )
    }

    #[tokio::test]
    async fn test_blood_test_worked_example() {
        let harness = worked_example();
        let request = upload_request(
            "/blood-test/pdf-analysis",
            multipart_body("file", "report.pdf", b"%PDF-1.4 fake"),
        );

        let (status, body) = send(app(&harness), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["test_type"], "blood_test");
        assert_eq!(body["extracted_text"], "Hemoglobin: 12.5 g/dL");
        assert_eq!(body["gpt_analysis_text"], "1. Hemoglobin normal.");
        assert!(body["input_pdf_url"].is_string());
        assert!(body["output_pdf_url"].is_string());
        assert_eq!(harness.store.uploads().len(), 2);
    }

    #[tokio::test]
    async fn test_every_test_type_route() {
        for test_type in TestType::ALL {
            let harness = worked_example();
            let uri = format!("/{}/pdf-analysis", test_type.slug());
            let request = upload_request(&uri, multipart_body("file", "r.pdf", b"%PDF"));

            let (status, body) = send(app(&harness), request).await;

            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body["test_type"], test_type.folder());
        }
    }

    #[tokio::test]
    async fn test_legacy_route_is_blood_test() {
        let harness = worked_example();
        let request = upload_request("/pdf-analysis", multipart_body("file", "r.pdf", b"%PDF"));

        let (status, body) = send(app(&harness), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["test_type"], "blood_test");
        assert!(harness.store.keys()[0].starts_with("blood_test/input/"));
    }

    #[tokio::test]
    async fn test_missing_file_field_is_bad_request() {
        let harness = worked_example();
        let request = upload_request(
            "/urine-test/pdf-analysis",
            multipart_body("attachment", "r.pdf", b"%PDF"),
        );

        let (status, body) = send(app(&harness), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file uploaded");
        assert!(harness.store.uploads().is_empty());
        assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.analyzer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_bad_request() {
        let harness = worked_example();
        let request = Request::builder()
            .method("POST")
            .uri("/liver-test/pdf-analysis")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let (status, body) = send(app(&harness), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file uploaded");
        assert!(harness.store.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_empty_file_is_bad_request() {
        let harness = worked_example();
        let request = upload_request("/blood-test/pdf-analysis", multipart_body("file", "r.pdf", b""));

        let (status, _) = send(app(&harness), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_test_type_is_not_found() {
        let harness = worked_example();
        let request = upload_request(
            "/thyroid-test/pdf-analysis",
            multipart_body("file", "r.pdf", b"%PDF"),
        );

        let (status, body) = send(app(&harness), request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Unknown test type 'thyroid-test'");
        assert!(harness.store.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_analysis_failure_is_server_error() {
        let harness = pipeline_with(
            FakeStore::ok(),
            FakeExtractor::returning("Hemoglobin: 12.5 g/dL"),
            FakeAnalyzer::failing(),
        );
        let request = upload_request(
            "/blood-test/pdf-analysis",
            multipart_body("file", "r.pdf", b"%PDF"),
        );

        let (status, body) = send(app(&harness), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to analyze PDF content");
        assert_eq!(harness.renderer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.store.uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_pdf_is_unprocessable() {
        let harness = pipeline_with(
            FakeStore::ok(),
            FakeExtractor::failing(),
            FakeAnalyzer::returning("unused"),
        );
        let request = upload_request(
            "/blood-test/pdf-analysis",
            multipart_body("file", "notes.txt", b"plain text"),
        );

        let (status, body) = send(app(&harness), request).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Uploaded file is not a readable PDF");
        assert_eq!(harness.analyzer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_render_failure_is_server_error() {
        let harness = pipeline_with_renderer(
            FakeStore::ok(),
            FakeExtractor::returning("Hemoglobin: 12.5 g/dL"),
            FakeAnalyzer::returning("1. Hemoglobin normal."),
            FakeRenderer::failing(),
        );
        let request = upload_request(
            "/blood-test/pdf-analysis",
            multipart_body("file", "r.pdf", b"%PDF"),
        );

        let (status, body) = send(app(&harness), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to generate report PDF");
        assert_eq!(harness.store.uploads().len(), 1);
        assert_eq!(
            std::fs::read_dir(harness.pipeline.work_dir()).unwrap().count(),
            0
        );
    }

    #[tokio::test]
    async fn test_scratch_failure_hides_cause() {
        let harness = worked_example();
        std::fs::remove_dir(harness.pipeline.work_dir()).unwrap();
        let request = upload_request(
            "/liver-test/pdf-analysis",
            multipart_body("file", "r.pdf", b"%PDF"),
        );

        let (status, body) = send(app(&harness), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let harness = worked_example();
        let config = Config {
            max_upload_bytes: 64,
            ..Config::default()
        };
        let request = upload_request(
            "/blood-test/pdf-analysis",
            multipart_body("file", "big.pdf", &[b'x'; 4096]),
        );

        let (status, body) = send(app_with(&harness, config), request).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "Uploaded file is too large");
        assert!(harness.store.uploads().is_empty());
        assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.analyzer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_health() {
        let harness = worked_example();
        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app(&harness), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "medical-report-analyzer");
    }
}
