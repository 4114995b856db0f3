use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse PDF: {0}")]
    Parse(String),
}

#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    /// Returns the text of every page in document order. Empty text is not an error.
    async fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Text extraction over the `pdf-extract` crate.
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    /// Pages are concatenated without a separator.
    pub fn extract_from_mem(bytes: &[u8]) -> Result<String, ExtractError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ExtractError::Parse(e.to_string()))?;
        Ok(pages.concat())
    }
}

#[async_trait::async_trait]
impl TextExtractor for PdfTextExtractor {
    #[tracing::instrument(
        name = "pipeline_stage extract",
        skip(self, path),
        fields(pipeline.stage = "extract", extract.chars)
    )]
    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ExtractError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        // pdf-extract can panic on malformed input; the join error covers that.
        let text = tokio::task::spawn_blocking(move || Self::extract_from_mem(&bytes))
            .await
            .map_err(|e| ExtractError::Parse(format!("extraction task failed: {e}")))??;

        tracing::Span::current().record("extract.chars", text.chars().count());

        Ok(text)
    }
}
