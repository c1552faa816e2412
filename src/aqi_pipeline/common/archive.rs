//! Safetensors reading and writing for the model artifacts.
//!
//! Weights are exported from the training side as a flat state dict: one f32
//! tensor per parameter, keyed by its layer path (`conv1.weight`,
//! `model.0.bias`, ...), plus optional string metadata. Tensors are handed to
//! candle through a [`VarBuilder`]; the metadata header is read separately.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};

use crate::aqi_pipeline::common::error::{ArtifactError, candle_to_artifact};

pub fn read_artifact(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    std::fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// String metadata stored in the safetensors header.
pub fn read_metadata(bytes: &[u8]) -> Result<HashMap<String, String>, ArtifactError> {
    let (_, header) = SafeTensors::read_metadata(bytes)?;
    Ok(header.metadata().clone().unwrap_or_default())
}

/// CPU f32 variable builder over an in-memory safetensors buffer.
pub fn var_builder(bytes: &[u8]) -> Result<VarBuilder<'static>, ArtifactError> {
    VarBuilder::from_buffered_safetensors(bytes.to_vec(), DType::F32, &Device::Cpu)
        .map_err(|e| candle_to_artifact("safetensors buffer", e))
}

/// Serializes named tensors as f32 together with `metadata`.
pub fn encode_tensors(
    tensors: &[(String, Tensor)],
    metadata: HashMap<String, String>,
) -> Result<Vec<u8>, ArtifactError> {
    let mut buffers = Vec::with_capacity(tensors.len());
    for (name, tensor) in tensors {
        let values = tensor
            .to_dtype(DType::F32)
            .and_then(|t| t.flatten_all())
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| candle_to_artifact(format!("tensor '{name}'"), e))?;
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        buffers.push(bytes);
    }

    let views = tensors
        .iter()
        .zip(&buffers)
        .map(|((name, tensor), bytes)| {
            TensorView::new(Dtype::F32, tensor.dims().to_vec(), bytes).map(|view| (name.clone(), view))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let metadata = if metadata.is_empty() { None } else { Some(metadata) };
    Ok(safetensors::serialize(views, &metadata)?)
}
