use std::path::{Path, PathBuf};

use tracing::info;

use crate::aqi_pipeline::common::archive::read_artifact;
use crate::aqi_pipeline::common::error::ArtifactError;
use crate::aqi_pipeline::config::types::PipelineConfig;

impl PipelineConfig {
    /// Reads a JSON configuration file.
    ///
    /// Missing fields take their defaults. Relative artifact and staging
    /// paths are resolved against the directory holding the file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ArtifactError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading pipeline configuration");

        let bytes = read_artifact(path)?;
        let mut config: PipelineConfig =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Makes every relative path in the configuration relative to `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let artifacts = &mut self.artifacts;
        rebase(&mut artifacts.dehaze_weights, base);
        for path in [
            &mut artifacts.regressor_weights,
            &mut artifacts.calibration,
            &mut artifacts.feature_stats,
            &mut self.staging_dir,
        ]
        .into_iter()
        .flatten()
        {
            rebase(path, base);
        }
    }
}

fn rebase(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}
