//! Analysis pipeline
//!
//! Wires the stages together behind the caller-facing entry points and
//! shapes their results for the wire.

mod pipeline;
mod result;
mod timing;


pub use pipeline::AqiPipeline;
pub use result::{AnalysisReport, AnalysisResponse, AqiResult, ErrorResponse};
pub use timing::{PipelineTimings, StepTiming, Timer};
