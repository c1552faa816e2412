use crate::aqi_pipeline::common::error::Result;
use crate::aqi_pipeline::dehaze::types::DehazeOutput;
use crate::aqi_pipeline::preprocess::{ChannelOrder, InputTensor};

/// A model mapping the input tensor to the haze map and clear scene.
///
/// Implementations are shared read-only between request threads.
pub trait HazeTransform: Send + Sync {
    fn dehaze(&self, input: &InputTensor) -> Result<DehazeOutput>;

    /// Channel order the parameters were fit under, when the artifact says.
    fn declared_channel_order(&self) -> Option<ChannelOrder> {
        None
    }
}
