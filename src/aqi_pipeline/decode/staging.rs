//! Request-scoped on-disk copies of uploads.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::aqi_pipeline::common::error::{AnalysisError, Result};

/// An upload written to a temporary file.
///
/// The file is deleted when the value is dropped, so every exit path of the
/// request that owns it cleans up.
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// Writes `data` to a fresh temporary file in `dir`, or in the system
    /// temporary directory when `dir` is `None`.
    pub fn stage(data: &[u8], dir: Option<&Path>) -> Result<Self> {
        let builder_result = match dir {
            Some(dir) => tempfile::Builder::new().prefix("upload-").tempfile_in(dir),
            None => tempfile::Builder::new().prefix("upload-").tempfile(),
        };
        let mut file = builder_result
            .map_err(|e| AnalysisError::InferenceFailure(format!("cannot stage upload: {e}")))?;

        file.write_all(data)
            .and_then(|_| file.flush())
            .map_err(|e| AnalysisError::InferenceFailure(format!("cannot stage upload: {e}")))?;

        debug!(path = %file.path().display(), bytes = data.len(), "Staged upload");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        debug!(path = %self.file.path().display(), "Removing staged upload");
    }
}
