use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Category of medical report. Selects the prompt template, the storage
/// folder and the response tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    BloodTest,
    UrineTest,
    LiverTest,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown test type: {0}")]
pub struct UnknownTestType(pub String);

impl TestType {
    pub const ALL: [TestType; 3] = [TestType::BloodTest, TestType::UrineTest, TestType::LiverTest];

    /// Path segment used in the HTTP route, e.g. `blood-test`.
    pub fn slug(&self) -> &'static str {
        match self {
            TestType::BloodTest => "blood-test",
            TestType::UrineTest => "urine-test",
            TestType::LiverTest => "liver-test",
        }
    }

    /// Storage prefix and prompt file stem, e.g. `blood_test`.
    pub fn folder(&self) -> &'static str {
        match self {
            TestType::BloodTest => "blood_test",
            TestType::UrineTest => "urine_test",
            TestType::LiverTest => "liver_test",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TestType::BloodTest => "Blood Test",
            TestType::UrineTest => "Urine Test",
            TestType::LiverTest => "Liver Test",
        }
    }

    pub fn report_title(&self) -> String {
        format!("Patient {} Analysis Report", self.label())
    }

    pub fn prompt_path(&self, prompt_dir: &Path) -> PathBuf {
        prompt_dir.join(format!("{}.txt", self.folder()))
    }
}

impl FromStr for TestType {
    type Err = UnknownTestType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        TestType::ALL
            .into_iter()
            .find(|t| t.slug() == normalized || t.folder() == normalized)
            .ok_or_else(|| UnknownTestType(s.to_string()))
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
