//! AOD-Net style dehazing network.
//!
//! Four 3->3 convolutions with ReLU produce intermediate maps x1..x4; their
//! channel concatenation goes through a fifth 12->3 convolution and ReLU to
//! give the transmission map K. The clear scene follows from the atmospheric
//! scattering model as `J = K * x - K + 1`.
//!
//! Parameters come from a safetensors export of the trained model's state
//! dict (`conv1.weight`, `conv1.bias`, ... `conv5.bias`). An optional
//! `channel_order` metadata entry records the plane order used in training.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Module, VarBuilder};
use ndarray::Array4;
use tracing::{debug, info};

use crate::aqi_pipeline::common::archive::{encode_tensors, read_artifact, read_metadata, var_builder};
use crate::aqi_pipeline::common::error::{
    ArtifactError, Result, candle_to_artifact, candle_to_inference,
};
use crate::aqi_pipeline::dehaze::transform::HazeTransform;
use crate::aqi_pipeline::dehaze::types::{DehazeOutput, HazeMap, ReconstructedScene};
use crate::aqi_pipeline::preprocess::{ChannelOrder, InputTensor};

pub const CHANNEL_ORDER_KEY: &str = "channel_order";

const MODEL_NAME: &str = "AOD-Net";
/// `(name, input channels)` per convolution.
const LAYERS: [(&str, usize); 5] = [("conv1", 3), ("conv2", 3), ("conv3", 3), ("conv4", 3), ("conv5", 12)];
const OUT_CHANNELS: usize = 3;
const KERNEL_SIZE: usize = 3;

/// 3x3, stride 1, zero padding 1: every layer keeps the spatial size.
pub fn conv_config() -> Conv2dConfig {
    Conv2dConfig {
        padding: 1,
        ..Default::default()
    }
}

fn load_layer(vb: &VarBuilder, (name, in_channels): (&str, usize)) -> std::result::Result<Conv2d, ArtifactError> {
    candle_nn::conv2d(in_channels, OUT_CHANNELS, KERNEL_SIZE, conv_config(), vb.pp(name))
        .map_err(|e| candle_to_artifact(format!("{MODEL_NAME} {name}"), e))
}

fn constant_layer(
    (name, in_channels): (&str, usize),
    bias: f32,
    device: &Device,
) -> std::result::Result<Conv2d, ArtifactError> {
    let build = || -> candle_core::Result<Conv2d> {
        let weight = Tensor::zeros((OUT_CHANNELS, in_channels, KERNEL_SIZE, KERNEL_SIZE), DType::F32, device)?;
        let bias = Tensor::full(bias, OUT_CHANNELS, device)?;
        Ok(Conv2d::new(weight, Some(bias), conv_config()))
    };
    build().map_err(|e| candle_to_artifact(format!("constant {name}"), e))
}

fn to_array4(tensor: &Tensor) -> candle_core::Result<Array4<f32>> {
    let dims = tensor.dims4()?;
    let values = tensor.flatten_all()?.to_vec1::<f32>()?;
    Array4::from_shape_vec(dims, values).map_err(candle_core::Error::wrap)
}

#[derive(Debug, Clone)]
pub struct AodNet {
    layers: [Conv2d; 5],
    device: Device,
    channel_order: Option<ChannelOrder>,
}

impl AodNet {
    /// Assembles the network from already built layers, checking that they
    /// have the fixed AOD-Net channel layout and geometry.
    pub fn from_layers(
        layers: [Conv2d; 5],
        channel_order: Option<ChannelOrder>,
    ) -> std::result::Result<Self, ArtifactError> {
        for (layer, (name, in_channels)) in layers.iter().zip(LAYERS) {
            let expected = [OUT_CHANNELS, in_channels, KERNEL_SIZE, KERNEL_SIZE];
            if layer.weight().dims() != &expected[..] {
                return Err(ArtifactError::ShapeMismatch {
                    name: format!("{name}.weight"),
                    expected: expected.to_vec(),
                    actual: layer.weight().dims().to_vec(),
                });
            }
            let bias_dims = layer.bias().map(|b| b.dims().to_vec()).unwrap_or_default();
            if bias_dims != vec![OUT_CHANNELS] {
                return Err(ArtifactError::ShapeMismatch {
                    name: format!("{name}.bias"),
                    expected: vec![OUT_CHANNELS],
                    actual: bias_dims,
                });
            }
            let config = layer.config();
            if config.padding != 1 || config.stride != 1 || config.dilation != 1 || config.groups != 1 {
                return Err(ArtifactError::ConfigMismatch(format!(
                    "{name} must be a stride 1, padding 1 convolution"
                )));
            }
        }

        let device = layers[0].weight().device().clone();
        Ok(Self {
            layers,
            device,
            channel_order,
        })
    }

    /// Builds the five convolutions from `vb` (`conv1` ... `conv5`).
    pub fn from_var_builder(
        vb: VarBuilder,
        channel_order: Option<ChannelOrder>,
    ) -> std::result::Result<Self, ArtifactError> {
        let [l1, l2, l3, l4, l5] = LAYERS;
        let layers = [
            load_layer(&vb, l1)?,
            load_layer(&vb, l2)?,
            load_layer(&vb, l3)?,
            load_layer(&vb, l4)?,
            load_layer(&vb, l5)?,
        ];
        Self::from_layers(layers, channel_order)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ArtifactError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading dehazing weights");
        let bytes = read_artifact(path)?;
        Self::from_safetensors(&bytes)
    }

    pub fn from_safetensors(bytes: &[u8]) -> std::result::Result<Self, ArtifactError> {
        let metadata = read_metadata(bytes)?;
        let channel_order = match metadata.get(CHANNEL_ORDER_KEY) {
            Some(value) => Some(ChannelOrder::parse(value).ok_or_else(|| {
                ArtifactError::ConfigMismatch(format!("unknown channel order '{value}' in weights"))
            })?),
            None => None,
        };

        debug!(?channel_order, "Dehazing weights parsed");
        Self::from_var_builder(var_builder(bytes)?, channel_order)
    }

    /// Serializes the parameters in the same layout [`AodNet::load`] reads.
    pub fn to_safetensors(&self) -> std::result::Result<Vec<u8>, ArtifactError> {
        let mut tensors = Vec::with_capacity(LAYERS.len() * 2);
        for (layer, (name, _)) in self.layers.iter().zip(LAYERS) {
            tensors.push((format!("{name}.weight"), layer.weight().clone()));
            if let Some(bias) = layer.bias() {
                tensors.push((format!("{name}.bias"), bias.clone()));
            }
        }

        let mut metadata = HashMap::new();
        if let Some(order) = self.channel_order {
            metadata.insert(CHANNEL_ORDER_KEY.to_string(), order.as_str().to_string());
        }
        encode_tensors(&tensors, metadata)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), ArtifactError> {
        let path = path.as_ref();
        let bytes = self.to_safetensors()?;
        std::fs::write(path, bytes).map_err(|source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Network whose transmission map is `value` everywhere (for `value >= 0`).
    ///
    /// Every weight is zero and the last layer's bias carries the constant.
    pub fn constant(value: f32, channel_order: Option<ChannelOrder>) -> std::result::Result<Self, ArtifactError> {
        let device = Device::Cpu;
        let [l1, l2, l3, l4, l5] = LAYERS;
        let layers = [
            constant_layer(l1, 0.0, &device)?,
            constant_layer(l2, 0.0, &device)?,
            constant_layer(l3, 0.0, &device)?,
            constant_layer(l4, 0.0, &device)?,
            constant_layer(l5, value, &device)?,
        ];
        Self::from_layers(layers, channel_order)
    }

    pub fn layers(&self) -> &[Conv2d; 5] {
        &self.layers
    }

    /// Forward pass over an NCHW batch, returning `(J, K)`.
    pub fn forward(&self, x: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
        let [conv1, conv2, conv3, conv4, conv5] = &self.layers;

        let x1 = conv1.forward(x)?.relu()?;
        let x2 = conv2.forward(&x1)?.relu()?;
        let x3 = conv3.forward(&x2)?.relu()?;
        let x4 = conv4.forward(&x3)?.relu()?;

        let stacked = Tensor::cat(&[&x1, &x2, &x3, &x4], 1)?;
        let k = conv5.forward(&stacked)?.relu()?;

        let j = k.mul(x)?.sub(&k)?.affine(1.0, 1.0)?;
        Ok((j, k))
    }
}

impl HazeTransform for AodNet {
    fn dehaze(&self, input: &InputTensor) -> Result<DehazeOutput> {
        let data = input.data();
        let x = Tensor::from_vec(data.iter().copied().collect::<Vec<f32>>(), data.dim(), &self.device)
            .map_err(|e| candle_to_inference(MODEL_NAME, "input tensor", e))?;

        let (j, k) = self
            .forward(&x)
            .map_err(|e| candle_to_inference(MODEL_NAME, "forward", e))?;

        let reconstructed = to_array4(&j).map_err(|e| candle_to_inference(MODEL_NAME, "read J", e))?;
        let haze_map = to_array4(&k).map_err(|e| candle_to_inference(MODEL_NAME, "read K", e))?;
        Ok(DehazeOutput {
            reconstructed: ReconstructedScene::new(reconstructed),
            haze_map: HazeMap::new(haze_map),
        })
    }

    fn declared_channel_order(&self) -> Option<ChannelOrder> {
        self.channel_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(in_channels: usize, weight: impl Fn(usize, usize, usize, usize) -> f32, bias: f32) -> Conv2d {
        let mut values = Vec::with_capacity(OUT_CHANNELS * in_channels * 9);
        for o in 0..OUT_CHANNELS {
            for i in 0..in_channels {
                for y in 0..3 {
                    for x in 0..3 {
                        values.push(weight(o, i, y, x));
                    }
                }
            }
        }
        let weight = Tensor::from_vec(values, (OUT_CHANNELS, in_channels, 3, 3), &Device::Cpu).unwrap();
        let bias = Tensor::full(bias, OUT_CHANNELS, &Device::Cpu).unwrap();
        Conv2d::new(weight, Some(bias), conv_config())
    }

    fn patterned(in_channels: usize, seed: usize) -> Conv2d {
        conv(
            in_channels,
            |o, i, y, x| ((o * 31 + i * 17 + y * 7 + x * 3 + seed) % 13) as f32 / 40.0 - 0.12,
            seed as f32 * 0.01,
        )
    }

    fn patterned_net() -> AodNet {
        let layers = [patterned(3, 1), patterned(3, 2), patterned(3, 3), patterned(3, 4), patterned(12, 5)];
        AodNet::from_layers(layers, Some(ChannelOrder::Rgb)).unwrap()
    }

    fn input(value: f32) -> InputTensor {
        InputTensor::new(Array4::from_elem((1, 3, 256, 256), value), ChannelOrder::Rgb).unwrap()
    }

    #[test]
    fn test_output_shapes() {
        let output = patterned_net().dehaze(&input(0.5)).unwrap();
        assert_eq!(output.haze_map.data().shape(), &[1, 3, 256, 256]);
        assert_eq!(output.reconstructed.data().shape(), &[1, 3, 256, 256]);
        assert!(output.haze_map.data().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_constant_network() {
        let output = AodNet::constant(2.0, None).unwrap().dehaze(&input(0.25)).unwrap();
        assert!(output.haze_map.data().iter().all(|&v| v == 2.0));
        // J = K * x - K + 1 = 2 * 0.25 - 2 + 1
        assert!(output.reconstructed.data().iter().all(|&v| (v - -0.5).abs() < 1e-6));
    }

    #[test]
    fn test_clear_air_leaves_scene_unchanged() {
        let output = AodNet::constant(1.0, None).unwrap().dehaze(&input(0.7)).unwrap();
        assert!(output.reconstructed.data().iter().all(|&v| (v - 0.7).abs() < 1e-6));
    }

    #[test]
    fn test_zero_padding_at_borders() {
        // conv1 sums its 3x3x3 window, conv5 copies x1's first plane into K.
        let zero = |in_channels| conv(in_channels, |_, _, _, _| 0.0, 0.0);
        let layers = [
            conv(3, |_, _, _, _| 1.0, 0.0),
            zero(3),
            zero(3),
            zero(3),
            conv(12, |_, i, y, x| if i == 0 && y == 1 && x == 1 { 1.0 } else { 0.0 }, 0.0),
        ];
        let net = AodNet::from_layers(layers, None).unwrap();

        let k = net.dehaze(&input(1.0)).unwrap().haze_map;
        let k = k.data();
        assert!((k[[0, 0, 0, 0]] - 12.0).abs() < 1e-4);
        assert!((k[[0, 1, 0, 7]] - 18.0).abs() < 1e-4);
        assert!((k[[0, 2, 100, 100]] - 27.0).abs() < 1e-4);
        assert!((k[[0, 0, 255, 255]] - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_forward_is_deterministic() {
        let net = patterned_net();
        let a = net.dehaze(&input(0.3)).unwrap();
        let b = net.dehaze(&input(0.3)).unwrap();
        assert_eq!(a.haze_map.data(), b.haze_map.data());
        assert_eq!(a.reconstructed.data(), b.reconstructed.data());
    }

    #[test]
    fn test_safetensors_preserves_parameters() {
        let net = patterned_net();
        let bytes = net.to_safetensors().unwrap();
        let loaded = AodNet::from_safetensors(&bytes).unwrap();

        assert_eq!(loaded.declared_channel_order(), Some(ChannelOrder::Rgb));
        let flat = |t: &Tensor| t.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        for (a, b) in net.layers().iter().zip(loaded.layers()) {
            assert_eq!(flat(a.weight()), flat(b.weight()));
            assert_eq!(flat(a.bias().unwrap()), flat(b.bias().unwrap()));
        }
        assert_eq!(
            net.dehaze(&input(0.4)).unwrap().haze_map.data(),
            loaded.dehaze(&input(0.4)).unwrap().haze_map.data()
        );
    }

    #[test]
    fn test_missing_layer_is_rejected() {
        let weight = Tensor::zeros((3, 3, 3, 3), DType::F32, &Device::Cpu).unwrap();
        let bytes = encode_tensors(&[("conv1.weight".to_string(), weight)], HashMap::new()).unwrap();
        assert!(matches!(
            AodNet::from_safetensors(&bytes),
            Err(ArtifactError::Model { .. })
        ));
    }

    #[test]
    fn test_unknown_channel_order_is_rejected() {
        let net = AodNet::constant(1.0, None).unwrap();
        let tensors: Vec<(String, Tensor)> = net
            .layers()
            .iter()
            .zip(LAYERS)
            .flat_map(|(layer, (name, _))| {
                [
                    (format!("{name}.weight"), layer.weight().clone()),
                    (format!("{name}.bias"), layer.bias().unwrap().clone()),
                ]
            })
            .collect();
        let metadata = HashMap::from([(CHANNEL_ORDER_KEY.to_string(), "yuv".to_string())]);
        let bytes = encode_tensors(&tensors, metadata).unwrap();

        assert!(matches!(
            AodNet::from_safetensors(&bytes),
            Err(ArtifactError::ConfigMismatch(_))
        ));
    }

    #[test]
    fn test_wrong_layer_layout_is_rejected() {
        let layers = [patterned(3, 1), patterned(3, 2), patterned(3, 3), patterned(3, 4), patterned(3, 5)];
        assert!(matches!(
            AodNet::from_layers(layers, None),
            Err(ArtifactError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_unpadded_layer_is_rejected() {
        let weight = Tensor::zeros((3, 3, 3, 3), DType::F32, &Device::Cpu).unwrap();
        let bias = Tensor::zeros(3, DType::F32, &Device::Cpu).unwrap();
        let unpadded = Conv2d::new(weight, Some(bias), Conv2dConfig::default());
        let layers = [unpadded, patterned(3, 2), patterned(3, 3), patterned(3, 4), patterned(12, 5)];
        assert!(matches!(
            AodNet::from_layers(layers, None),
            Err(ArtifactError::ConfigMismatch(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AodNet::load(dir.path().join("absent.safetensors")),
            Err(ArtifactError::Read { .. })
        ));
    }
}
