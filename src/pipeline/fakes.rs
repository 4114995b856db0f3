//! In-memory collaborators for exercising the pipeline without S3 or an LLM.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use super::analyze::{PromptLibrary, ReportAnalyzer};
use super::extract::{ExtractError, TextExtractor};
use super::orchestrator::Pipeline;
use super::render::{PdfReportRenderer, RenderError, ReportRenderer};
use crate::storage::{ObjectStore, StorageError};
use crate::test_type::TestType;

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub key: String,
    pub local_path: PathBuf,
    pub bytes: Vec<u8>,
}

pub struct FakeStore {
    fail: bool,
    uploads: Mutex<Vec<RecordedUpload>>,
}

impl FakeStore {
    pub fn ok() -> Self {
        Self {
            fail: false,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.uploads().into_iter().map(|u| u.key).collect()
    }
}

#[async_trait::async_trait]
impl ObjectStore for FakeStore {
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, StorageError> {
        let bytes = std::fs::read(local_path).map_err(|e| StorageError::LocalFile {
            path: local_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.uploads.lock().unwrap().push(RecordedUpload {
            key: key.to_string(),
            local_path: local_path.to_path_buf(),
            bytes,
        });

        if self.fail {
            return Err(StorageError::Credentials("no credentials configured".to_string()));
        }
        Ok(format!("https://fake-bucket.local/{key}?X-Amz-Expires=3600"))
    }
}

pub struct FakeExtractor {
    text: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(path.exists(), "extractor must see the staged upload");
        self.text
            .clone()
            .ok_or_else(|| ExtractError::Parse("invalid file header".to_string()))
    }
}

pub struct FakeAnalyzer {
    reply: Option<String>,
    pub calls: AtomicUsize,
    seen: Mutex<Vec<(String, String)>>,
}

impl FakeAnalyzer {
    pub fn returning(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_texts(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn seen_templates(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait::async_trait]
impl ReportAnalyzer for FakeAnalyzer {
    async fn analyze(&self, text: &str, _test_type: TestType, template: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((text.to_string(), template.to_string()));
        self.reply.clone()
    }
}

/// Counts invocations. The working variant delegates to the real renderer;
/// the failing one leaves a partial file behind before erroring.
pub struct FakeRenderer {
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeRenderer {
    pub fn real() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl ReportRenderer for FakeRenderer {
    async fn render(&self, title: &str, analysis: &str, mut output: File) -> Result<(), RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            output.write_all(b"%PDF-1.5 partial").map_err(RenderError::Write)?;
            return Err(RenderError::Serialize("font table missing".to_string()));
        }
        PdfReportRenderer.render(title, analysis, output).await
    }
}

pub fn write_templates(dir: &Path) {
    for test_type in TestType::ALL {
        std::fs::write(
            test_type.prompt_path(dir),
            format!("template for {}", test_type.folder()),
        )
        .unwrap();
    }
}

pub struct Harness {
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<FakeStore>,
    pub extractor: Arc<FakeExtractor>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub renderer: Arc<FakeRenderer>,
    pub prompt_dir: TempDir,
    pub _work_dir: TempDir,
}

pub fn pipeline_with(store: FakeStore, extractor: FakeExtractor, analyzer: FakeAnalyzer) -> Harness {
    pipeline_with_renderer(store, extractor, analyzer, FakeRenderer::real())
}

pub fn pipeline_with_renderer(
    store: FakeStore,
    extractor: FakeExtractor,
    analyzer: FakeAnalyzer,
    renderer: FakeRenderer,
) -> Harness {
    let prompt_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    write_templates(prompt_dir.path());

    let store = Arc::new(store);
    let extractor = Arc::new(extractor);
    let analyzer = Arc::new(analyzer);
    let renderer = Arc::new(renderer);

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        extractor.clone(),
        analyzer.clone(),
        renderer.clone(),
        PromptLibrary::new(prompt_dir.path()),
        work_dir.path(),
    ));

    Harness {
        pipeline,
        store,
        extractor,
        analyzer,
        renderer,
        prompt_dir,
        _work_dir: work_dir,
    }
}
