//! Common utilities module
//!
//! Error taxonomy, artifact IO and numeric helpers shared across the
//! analysis stages.

pub mod archive;
pub mod error;
pub mod stats;

pub use archive::{encode_tensors, read_artifact, read_metadata, var_builder};
pub use error::{AnalysisError, ArtifactError, ErrorKind, Result};
pub use stats::{MeanStd, mean_std};
