use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use opentelemetry::KeyValue;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::storage::ObjectStore;
use crate::telemetry::metrics::{
    ANALYSIS_DURATION, ANALYSIS_EXTRACTED_CHARS, ANALYSIS_REQUESTS, STORAGE_UPLOAD_FAILURES,
};
use crate::test_type::TestType;

use super::analyze::{PromptLibrary, ReportAnalyzer};
use super::extract::{ExtractError, TextExtractor};
use super::render::{RenderError, ReportRenderer};
use super::session::{self, ScratchFile, SessionId};

/// A file received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub test_type: TestType,
    pub input_pdf_url: Option<String>,
    pub output_pdf_url: Option<String>,
    pub extracted_text: String,
    pub gpt_analysis_text: String,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no file uploaded")]
    MissingFile,

    #[error("scratch file error at {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("text extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("analysis failed")]
    AnalysisFailed,

    #[error("report rendering failed: {0}")]
    Render(#[from] RenderError),
}

impl PipelineError {
    fn outcome(&self) -> &'static str {
        match self {
            PipelineError::MissingFile => "missing_file",
            PipelineError::Scratch { .. } => "scratch_error",
            PipelineError::Extraction(_) => "extraction_failed",
            PipelineError::AnalysisFailed => "analysis_failed",
            PipelineError::Render(_) => "render_failed",
        }
    }
}

/// The per-request workflow: store, extract, analyze, render, store.
/// Collaborators are injected so each can be swapped independently.
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn TextExtractor>,
    analyzer: Arc<dyn ReportAnalyzer>,
    renderer: Arc<dyn ReportRenderer>,
    prompts: PromptLibrary,
    work_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn TextExtractor>,
        analyzer: Arc<dyn ReportAnalyzer>,
        renderer: Arc<dyn ReportRenderer>,
        prompts: PromptLibrary,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            extractor,
            analyzer,
            renderer,
            prompts,
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    #[tracing::instrument(
        name = "pipeline analysis",
        skip(self, upload),
        fields(
            report.test_type = %test_type.folder(),
            session.id,
            upload.bytes,
            extract.chars,
            analysis.outcome,
        )
    )]
    pub async fn handle(
        &self,
        test_type: TestType,
        upload: Option<Upload>,
    ) -> Result<AnalysisResponse, PipelineError> {
        let start = Instant::now();
        let result = self.run(test_type, upload).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        tracing::Span::current().record("analysis.outcome", outcome);

        let attrs = [
            KeyValue::new("report.test_type", test_type.folder()),
            KeyValue::new("analysis.outcome", outcome),
        ];
        ANALYSIS_REQUESTS.add(1, &attrs);
        ANALYSIS_DURATION.record(start.elapsed().as_secs_f64(), &attrs);

        result
    }

    async fn run(
        &self,
        test_type: TestType,
        upload: Option<Upload>,
    ) -> Result<AnalysisResponse, PipelineError> {
        let upload = upload
            .filter(|u| !u.bytes.is_empty())
            .ok_or(PipelineError::MissingFile)?;

        let span = tracing::Span::current();
        let session = SessionId::generate();
        span.record("session.id", session.as_str());
        span.record("upload.bytes", upload.bytes.len());

        let input = self.scratch_file("input", &session)?;
        stage_upload(&input, &upload.bytes)
            .await
            .map_err(|source| PipelineError::Scratch {
                path: input.path().to_path_buf(),
                source,
            })?;

        let filename = session::sanitize_filename(upload.file_name.as_deref());
        let input_key = session::input_key(test_type, &session, &filename);
        let input_pdf_url = self.store_artifact(input.path(), &input_key).await;

        let extracted_text = self.extractor.extract(input.path()).await?;
        let extracted_chars = extracted_text.chars().count();
        span.record("extract.chars", extracted_chars);
        ANALYSIS_EXTRACTED_CHARS.record(
            extracted_chars as f64,
            &[KeyValue::new("report.test_type", test_type.folder())],
        );
        if extracted_text.trim().is_empty() {
            tracing::warn!("No text extracted from upload, continuing with empty findings");
        }

        let template = match self.prompts.load(test_type).await {
            Ok(template) => template,
            Err(e) => {
                tracing::error!(
                    path = %self.prompts.path_for(test_type).display(),
                    error = %e,
                    "Prompt template unavailable"
                );
                return Err(PipelineError::AnalysisFailed);
            }
        };

        let analysis = self
            .analyzer
            .analyze(&extracted_text, test_type, &template)
            .await
            .ok_or(PipelineError::AnalysisFailed)?;

        let output = self.scratch_file("output", &session)?;
        let report = output.reopen().map_err(|source| PipelineError::Scratch {
            path: output.path().to_path_buf(),
            source,
        })?;
        self.renderer
            .render(&test_type.report_title(), &analysis, report)
            .await?;

        let output_key = session::output_key(test_type, &session);
        let output_pdf_url = self.store_artifact(output.path(), &output_key).await;

        drop(input);
        drop(output);

        tracing::info!(
            input_stored = input_pdf_url.is_some(),
            output_stored = output_pdf_url.is_some(),
            "Report analysis complete"
        );

        Ok(AnalysisResponse {
            test_type,
            input_pdf_url,
            output_pdf_url,
            extracted_text,
            gpt_analysis_text: analysis,
        })
    }

    fn scratch_file(&self, role: &str, session: &SessionId) -> Result<ScratchFile, PipelineError> {
        ScratchFile::new(&self.work_dir, role, session).map_err(|source| PipelineError::Scratch {
            path: self.work_dir.clone(),
            source,
        })
    }

    /// Storage failures degrade to a missing URL instead of failing the request.
    async fn store_artifact(&self, path: &Path, key: &str) -> Option<String> {
        match self.store.upload(path, key).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Object store upload failed");
                STORAGE_UPLOAD_FAILURES.add(1, &[KeyValue::new("storage.error", e.kind())]);
                None
            }
        }
    }
}

/// Writes through an open handle so a cancelled request cannot recreate the
/// scratch path after its guard has removed it.
async fn stage_upload(scratch: &ScratchFile, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::from_std(scratch.reopen()?);
    file.write_all(bytes).await?;
    file.flush().await
}
