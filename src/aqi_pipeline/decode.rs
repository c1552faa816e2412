//! Image decoding module
//!
//! Turns uploaded bytes into a [`RawImage`] and stages uploads on disk for the
//! lifetime of a single request.

mod reader;
mod standard_decoder;
mod staging;
pub mod types;

pub use reader::ImageDecoder;
pub use standard_decoder::StandardImageDecoder;
pub use staging::StagedUpload;
pub use types::RawImage;
