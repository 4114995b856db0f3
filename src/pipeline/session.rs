use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

use chrono::Utc;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::test_type::TestType;

const FALLBACK_FILENAME: &str = "upload.pdf";

/// Per-request token namespacing scratch files and stored objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// `<YYYYMMDD_HHMMSS>_<8 random hex chars>`.
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            &suffix[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keeps the last path component of a client-supplied name and replaces anything
/// outside `[A-Za-z0-9._-]`.
pub fn sanitize_filename(name: Option<&str>) -> String {
    let base = name
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned
    }
}

pub fn input_key(test_type: TestType, session: &SessionId, filename: &str) -> String {
    format!("{}/input/{}_{}", test_type.folder(), session, filename)
}

pub fn output_key(test_type: TestType, session: &SessionId) -> String {
    format!("{}/output/{}_report.pdf", test_type.folder(), session)
}

/// A local file owned by one request, created inside the work directory and
/// removed when dropped, so every exit path of the pipeline cleans up after itself.
#[derive(Debug)]
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    /// Creates `temp_<role>_<session>_<random>.pdf` in `work_dir`.
    pub fn new(work_dir: &Path, role: &str, session: &SessionId) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(&format!("temp_{role}_{session}_"))
            .suffix(".pdf")
            .tempfile_in(work_dir)?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// A second handle on the same file. Writes through it never recreate the
    /// path once the scratch file has been dropped.
    pub fn reopen(&self) -> io::Result<File> {
        self.file.reopen()
    }
}
