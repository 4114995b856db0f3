use std::path::PathBuf;
use std::sync::Arc;

use crate::llm::{GenerateRequest, LlmClient};
use crate::test_type::TestType;

pub const SYSTEM_PROMPT: &str = "You are a medical assistant.";

const TEXT_PLACEHOLDER: &str = "{text}";

/// Resolves prompt templates from disk. Read fresh on every call so template
/// edits take effect without a restart.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    dir: PathBuf,
}

impl PromptLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, test_type: TestType) -> PathBuf {
        test_type.prompt_path(&self.dir)
    }

    pub async fn load(&self, test_type: TestType) -> std::io::Result<String> {
        tokio::fs::read_to_string(self.path_for(test_type)).await
    }
}

/// Templates carrying a `{text}` placeholder are filled in place; any other
/// template gets a labelled findings section appended.
pub fn build_prompt(template: &str, test_type: TestType, text: &str) -> String {
    if template.contains(TEXT_PLACEHOLDER) {
        template.replace(TEXT_PLACEHOLDER, text)
    } else {
        format!("{template}\n\n{} Findings:\n{text}", test_type.label())
    }
}

#[async_trait::async_trait]
pub trait ReportAnalyzer: Send + Sync {
    /// `None` means the analysis failed; the cause has already been logged.
    async fn analyze(&self, text: &str, test_type: TestType, template: &str) -> Option<String>;
}

pub struct LlmAnalyzer {
    client: Arc<LlmClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmAnalyzer {
    pub fn new(client: Arc<LlmClient>, model: &str, temperature: f32, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature,
            max_tokens,
        }
    }
}

#[async_trait::async_trait]
impl ReportAnalyzer for LlmAnalyzer {
    #[tracing::instrument(
        name = "pipeline_stage analyze",
        skip(self, text, template),
        fields(
            pipeline.stage = "analyze",
            report.test_type = %test_type.folder(),
            analysis.chars,
        )
    )]
    async fn analyze(&self, text: &str, test_type: TestType, template: &str) -> Option<String> {
        let req = GenerateRequest {
            model: self.model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(template, test_type, text),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            test_type,
        };

        match self.client.generate(&req).await {
            Ok(resp) if resp.content.trim().is_empty() => {
                tracing::error!(
                    provider = %self.client.provider_name(),
                    model = %resp.model,
                    finish_reason = %resp.finish_reason,
                    "LLM returned an empty analysis"
                );
                None
            }
            Ok(resp) => {
                tracing::Span::current().record("analysis.chars", resp.content.chars().count());
                Some(resp.content)
            }
            Err(e) => {
                tracing::error!(
                    provider = %self.client.provider_name(),
                    model = %self.model,
                    error = %e,
                    "LLM analysis failed"
                );
                None
            }
        }
    }
}
