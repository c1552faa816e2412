//! Dehazing module
//!
//! AOD-style network producing the haze transmission map K and the
//! reconstructed clear scene J from a preprocessed photograph.

mod aodnet;
mod transform;
pub mod types;

pub use aodnet::{AodNet, CHANNEL_ORDER_KEY, conv_config};
pub use transform::HazeTransform;
pub use types::{DehazeOutput, HazeMap, ReconstructedScene};
