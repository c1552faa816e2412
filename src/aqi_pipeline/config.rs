//! Pipeline configuration
//!
//! Resolved once at startup and then read-only. Holds the settings that must
//! agree with the trained artifacts (channel order, feature variant) next to
//! the artifact locations themselves.

mod loader;
pub mod types;

pub use types::{ArtifactPaths, PipelineConfig, PipelineConfigBuilder};
