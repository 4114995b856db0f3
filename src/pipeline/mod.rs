pub mod analyze;
pub mod extract;
pub mod orchestrator;
pub mod render;
pub mod session;

#[cfg(test)]
pub(crate) mod fakes;

pub use analyze::{LlmAnalyzer, PromptLibrary, ReportAnalyzer};
pub use extract::{PdfTextExtractor, TextExtractor};
pub use orchestrator::{AnalysisResponse, Pipeline, PipelineError, Upload};
pub use render::{PdfReportRenderer, ReportRenderer};
