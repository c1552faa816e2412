//! Preprocessing module
//!
//! Converts a decoded photograph into the fixed-shape, channel-first tensor
//! the dehazing network consumes.

mod tensor;
pub mod types;

pub use tensor::preprocess;
pub use types::{ChannelOrder, INPUT_SIZE, InputTensor};
