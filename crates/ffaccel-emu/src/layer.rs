//! Layer specifications
//!
//! The caller owns every tensor; the orchestrator reads inputs, weights and
//! biases and writes only the output tensor.
//!
//! ## Layouts
//!
//! | Tensor | Fully-connected | Convolutional |
//! |--------|-----------------|---------------|
//! | input | `[input_size]` | `[H_i, W_i, D_i]` |
//! | weights / kernel | `[output_size, input_size]` | `[D_o, K_r, K_c, D_i]` |
//! | biases | `[output_size]` | `[D_o]` |
//! | output | `[output_size]` | `[H_o, W_o, D_o]` |
//!
//! Convolutions are unpadded: the last receptive field must lie inside the
//! input feature map.

use crate::error::{EmulatorError, Result};
use crate::tensor::{Shape, Tensor};

/// Layer-type discriminator as carried in a tagged layer record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LayerType {
    /// Dense layer
    FullyConnected = 0x00,
    /// 2-D convolution
    Convolutional = 0x01,
}

impl LayerType {
    /// Raw tag value
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for LayerType {
    type Error = EmulatorError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0x00 => Ok(Self::FullyConnected),
            0x01 => Ok(Self::Convolutional),
            _ => Err(EmulatorError::UnrecognizedLayerType { tag }),
        }
    }
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FullyConnected => write!(f, "FullyConnected"),
            Self::Convolutional => write!(f, "Convolutional"),
        }
    }
}

/// Fully-connected layer
#[derive(Debug, Clone, PartialEq)]
pub struct FullyConnected {
    input_size: usize,
    output_size: usize,
    inputs: Tensor,
    weights: Tensor,
    biases: Tensor,
    outputs: Tensor,
}

impl FullyConnected {
    /// Build a dense layer; outputs start zeroed
    ///
    /// `weights` is row-major `output_size × input_size`.
    ///
    /// # Errors
    ///
    /// Returns a shape mismatch if any vector's length disagrees with the
    /// declared sizes, or an invalid-layer error if `output_size × input_size`
    /// overflows.
    pub fn new(
        input_size: usize,
        output_size: usize,
        inputs: Vec<f32>,
        weights: Vec<f32>,
        biases: Vec<f32>,
    ) -> Result<Self> {
        Ok(Self {
            input_size,
            output_size,
            inputs: Tensor::new(Shape::new(vec![input_size]), inputs)?,
            weights: Tensor::new(Shape::new(vec![output_size, input_size]), weights)?,
            biases: Tensor::new(Shape::new(vec![output_size]), biases)?,
            outputs: Tensor::zeros(Shape::new(vec![output_size]))?,
        })
    }

    /// Input vector length
    pub const fn input_size(&self) -> usize {
        self.input_size
    }

    /// Output vector length
    pub const fn output_size(&self) -> usize {
        self.output_size
    }

    /// Input vector
    pub const fn inputs(&self) -> &Tensor {
        &self.inputs
    }

    /// Weight matrix `[output_size, input_size]`
    pub const fn weights(&self) -> &Tensor {
        &self.weights
    }

    /// Bias vector
    pub const fn biases(&self) -> &Tensor {
        &self.biases
    }

    /// Output vector
    pub const fn outputs(&self) -> &Tensor {
        &self.outputs
    }

    /// Output vector, writable
    pub fn outputs_mut(&mut self) -> &mut Tensor {
        &mut self.outputs
    }

    /// Read-only operands alongside the writable output
    pub(crate) fn split_mut(&mut self) -> (&Tensor, &Tensor, &Tensor, &mut Tensor) {
        (&self.inputs, &self.weights, &self.biases, &mut self.outputs)
    }
}

/// Convolutional layer
#[derive(Debug, Clone, PartialEq)]
pub struct Convolutional {
    kernel_rows: usize,
    kernel_cols: usize,
    stride: usize,
    ifm: Tensor,
    kernel: Tensor,
    biases: Tensor,
    ofm: Tensor,
}

impl Convolutional {
    /// Build a convolution; the output feature map starts zeroed
    ///
    /// Kernel depth and kernel count are inferred from the input and output
    /// depths.
    ///
    /// # Errors
    ///
    /// Returns an invalid-layer error for a zero stride, for geometry whose
    /// extents overflow `usize`, or for an output map whose receptive fields
    /// fall outside the input map, and a shape mismatch for tensors of the
    /// wrong length.
    pub fn new(
        ifm_dims: [usize; 3],
        ofm_dims: [usize; 3],
        kernel_dims: [usize; 2],
        stride: usize,
        ifm: Vec<f32>,
        kernel: Vec<f32>,
        biases: Vec<f32>,
    ) -> Result<Self> {
        let [h_i, w_i, d_i] = ifm_dims;
        let [h_o, w_o, d_o] = ofm_dims;
        let [k_r, k_c] = kernel_dims;

        if stride == 0 {
            return Err(EmulatorError::invalid_layer("stride must be at least 1"));
        }
        if k_r.checked_mul(k_c).and_then(|k| k.checked_mul(d_i)).is_none() {
            return Err(EmulatorError::invalid_layer(format!(
                "receptive field {k_r}×{k_c}×{d_i} overflows"
            )));
        }
        if h_o > 0 && w_o > 0 {
            let span = |out: usize, k: usize| stride.checked_mul(out - 1).and_then(|s| s.checked_add(k));
            let (Some(rows_needed), Some(cols_needed)) = (span(h_o, k_r), span(w_o, k_c)) else {
                return Err(EmulatorError::invalid_layer(format!(
                    "output map {h_o}×{w_o} with {k_r}×{k_c} kernel, stride {stride} overflows"
                )));
            };
            if rows_needed > h_i || cols_needed > w_i {
                return Err(EmulatorError::invalid_layer(format!(
                    "output map {h_o}×{w_o} with {k_r}×{k_c} kernel, stride {stride} needs \
                     {rows_needed}×{cols_needed} input, have {h_i}×{w_i}"
                )));
            }
        }

        Ok(Self {
            kernel_rows: k_r,
            kernel_cols: k_c,
            stride,
            ifm: Tensor::new(Shape::new(ifm_dims.to_vec()), ifm)?,
            kernel: Tensor::new(Shape::new(vec![d_o, k_r, k_c, d_i]), kernel)?,
            biases: Tensor::new(Shape::new(vec![d_o]), biases)?,
            ofm: Tensor::zeros(Shape::new(ofm_dims.to_vec()))?,
        })
    }

    /// Output map dimensions of an unpadded convolution
    ///
    /// # Errors
    ///
    /// Returns an invalid-layer error for a zero stride or a kernel larger
    /// than the input map.
    pub fn output_dims_for(
        ifm_dims: [usize; 3],
        kernel_dims: [usize; 2],
        stride: usize,
        filters: usize,
    ) -> Result<[usize; 3]> {
        let [h_i, w_i, _] = ifm_dims;
        let [k_r, k_c] = kernel_dims;
        if stride == 0 {
            return Err(EmulatorError::invalid_layer("stride must be at least 1"));
        }
        if k_r > h_i || k_c > w_i {
            return Err(EmulatorError::invalid_layer(format!(
                "kernel {k_r}×{k_c} larger than input map {h_i}×{w_i}"
            )));
        }
        Ok([(h_i - k_r) / stride + 1, (w_i - k_c) / stride + 1, filters])
    }

    /// Input feature map `[H_i, W_i, D_i]`
    pub const fn ifm(&self) -> &Tensor {
        &self.ifm
    }

    /// Kernel tensor `[D_o, K_r, K_c, D_i]`
    pub const fn kernel(&self) -> &Tensor {
        &self.kernel
    }

    /// Per-output-channel biases `[D_o]`
    pub const fn biases(&self) -> &Tensor {
        &self.biases
    }

    /// Output feature map `[H_o, W_o, D_o]`
    pub const fn ofm(&self) -> &Tensor {
        &self.ofm
    }

    /// Output feature map, writable
    pub fn ofm_mut(&mut self) -> &mut Tensor {
        &mut self.ofm
    }

    /// Read-only operands alongside the writable output map
    pub(crate) fn split_mut(&mut self) -> (&Tensor, &Tensor, &Tensor, &mut Tensor) {
        (&self.ifm, &self.kernel, &self.biases, &mut self.ofm)
    }

    /// Input map dimensions
    pub fn ifm_dims(&self) -> [usize; 3] {
        dims3(self.ifm.shape())
    }

    /// Output map dimensions
    pub fn ofm_dims(&self) -> [usize; 3] {
        dims3(self.ofm.shape())
    }

    /// Kernel rows
    pub const fn kernel_rows(&self) -> usize {
        self.kernel_rows
    }

    /// Kernel columns
    pub const fn kernel_cols(&self) -> usize {
        self.kernel_cols
    }

    /// Stride (rows and columns)
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Elements in one receptive field (`K_r · K_c · D_i`)
    pub fn receptive_field_len(&self) -> usize {
        self.kernel_rows * self.kernel_cols * self.ifm_dims()[2]
    }
}

fn dims3(shape: &Shape) -> [usize; 3] {
    [shape.dims[0], shape.dims[1], shape.dims[2]]
}

/// A layer to evaluate
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// Dense layer
    FullyConnected(FullyConnected),
    /// 2-D convolution
    Convolutional(Convolutional),
}

impl Layer {
    /// Discriminator
    pub const fn layer_type(&self) -> LayerType {
        match self {
            Self::FullyConnected(_) => LayerType::FullyConnected,
            Self::Convolutional(_) => LayerType::Convolutional,
        }
    }

    /// Borrow the layer for evaluation
    pub fn as_layer_mut(&mut self) -> LayerMut<'_> {
        match self {
            Self::FullyConnected(fc) => LayerMut::FullyConnected(fc),
            Self::Convolutional(conv) => LayerMut::Convolutional(conv),
        }
    }

    /// Output tensor
    pub const fn outputs(&self) -> &Tensor {
        match self {
            Self::FullyConnected(fc) => fc.outputs(),
            Self::Convolutional(conv) => conv.ofm(),
        }
    }
}

impl From<FullyConnected> for Layer {
    fn from(fc: FullyConnected) -> Self {
        Self::FullyConnected(fc)
    }
}

impl From<Convolutional> for Layer {
    fn from(conv: Convolutional) -> Self {
        Self::Convolutional(conv)
    }
}

/// Mutable borrow of one layer, from a [`Layer`] or a tagged record
#[derive(Debug)]
pub enum LayerMut<'a> {
    /// Dense layer
    FullyConnected(&'a mut FullyConnected),
    /// 2-D convolution
    Convolutional(&'a mut Convolutional),
}

impl LayerMut<'_> {
    /// Discriminator
    pub const fn layer_type(&self) -> LayerType {
        match self {
            Self::FullyConnected(_) => LayerType::FullyConnected,
            Self::Convolutional(_) => LayerType::Convolutional,
        }
    }
}

/// Tagged layer record: a raw type tag plus optional sub-structures
///
/// Only the sub-structure selected by the tag is read.
#[derive(Debug, Clone, Default)]
pub struct LayerParameters {
    /// Raw layer-type tag (`0x00` FC, `0x01` conv)
    pub layer_type: u8,
    /// Dense sub-structure
    pub fully_connected: Option<FullyConnected>,
    /// Convolution sub-structure
    pub convolutional: Option<Convolutional>,
}

impl LayerParameters {
    /// Tagged record for a dense layer
    pub fn fully_connected(fc: FullyConnected) -> Self {
        Self {
            layer_type: LayerType::FullyConnected.tag(),
            fully_connected: Some(fc),
            convolutional: None,
        }
    }

    /// Tagged record for a convolution
    pub fn convolutional(conv: Convolutional) -> Self {
        Self {
            layer_type: LayerType::Convolutional.tag(),
            fully_connected: None,
            convolutional: Some(conv),
        }
    }

    /// Borrow the sub-structure selected by the tag
    ///
    /// # Errors
    ///
    /// Returns an unrecognized-layer-type error for an unknown tag, or an
    /// invalid-layer error when the selected sub-structure is missing.
    pub fn selected_mut(&mut self) -> Result<LayerMut<'_>> {
        match LayerType::try_from(self.layer_type)? {
            LayerType::FullyConnected => self
                .fully_connected
                .as_mut()
                .map(LayerMut::FullyConnected)
                .ok_or_else(|| EmulatorError::invalid_layer("FC tag without FC structure")),
            LayerType::Convolutional => self
                .convolutional
                .as_mut()
                .map(LayerMut::Convolutional)
                .ok_or_else(|| EmulatorError::invalid_layer("conv tag without conv structure")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        assert_eq!(LayerType::try_from(0x00).unwrap(), LayerType::FullyConnected);
        assert_eq!(LayerType::try_from(0x01).unwrap(), LayerType::Convolutional);
        assert_eq!(LayerType::Convolutional.tag(), 0x01);
    }

    #[test]
    fn unknown_tag_rejected() {
        let err = LayerType::try_from(0x02).unwrap_err();
        assert!(matches!(err, EmulatorError::UnrecognizedLayerType { tag: 0x02 }));
    }

    #[test]
    fn fc_lengths_checked() {
        assert!(FullyConnected::new(2, 2, vec![0.0; 2], vec![0.0; 4], vec![0.0; 2]).is_ok());
        assert!(FullyConnected::new(2, 2, vec![0.0; 2], vec![0.0; 3], vec![0.0; 2]).is_err());
        assert!(FullyConnected::new(2, 2, vec![0.0; 1], vec![0.0; 4], vec![0.0; 2]).is_err());
        assert!(FullyConnected::new(2, 2, vec![0.0; 2], vec![0.0; 4], vec![0.0; 3]).is_err());
    }

    #[test]
    fn conv_geometry_checked() {
        // 5×5×1 input, 3×3 kernel, stride 1 → 3×3 output
        let ok = Convolutional::new([5, 5, 1], [3, 3, 2], [3, 3], 1, vec![0.0; 25], vec![0.0; 18], vec![0.0; 2]);
        assert!(ok.is_ok());
        // 4×4 output would read past the input
        let too_big = Convolutional::new([5, 5, 1], [4, 4, 2], [3, 3], 1, vec![0.0; 25], vec![0.0; 18], vec![0.0; 2]);
        assert!(matches!(too_big, Err(EmulatorError::InvalidLayer { .. })));
        let zero_stride = Convolutional::new([5, 5, 1], [3, 3, 2], [3, 3], 0, vec![0.0; 25], vec![0.0; 18], vec![0.0; 2]);
        assert!(zero_stride.is_err());
    }

    #[test]
    fn conv_geometry_overflow_rejected() {
        let huge_stride = Convolutional::new([1, 1, 1], [2, 1, 1], [1, 1], usize::MAX, vec![0.0], vec![0.0], vec![0.0]);
        assert!(matches!(huge_stride, Err(EmulatorError::InvalidLayer { .. })));
        let wide_kernel = Convolutional::new([1, 1, 1], [1, 1, 1], [1, usize::MAX], 1, vec![0.0], vec![], vec![0.0]);
        assert!(matches!(wide_kernel, Err(EmulatorError::InvalidLayer { .. })));
        // no filters, so the kernel tensor is empty but the field still overflows
        let deep_field = Convolutional::new([0, 0, usize::MAX], [0, 0, 0], [2, 2], 1, vec![], vec![], vec![]);
        assert!(matches!(deep_field, Err(EmulatorError::InvalidLayer { .. })));
    }

    #[test]
    fn fc_size_overflow_rejected() {
        let err = FullyConnected::new(2, usize::MAX, vec![0.0; 2], vec![], vec![]).unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidLayer { .. }), "{err}");
    }

    #[test]
    fn operand_layouts() {
        let fc = FullyConnected::new(3, 2, vec![0.0; 3], vec![0.0; 6], vec![0.0; 2]).unwrap();
        assert_eq!(fc.inputs().shape().dims, [3]);
        assert_eq!(fc.weights().shape().dims, [2, 3]);
        assert_eq!(fc.biases().shape().dims, [2]);

        let conv = Convolutional::new([4, 5, 3], [2, 3, 2], [3, 3], 1, vec![0.0; 60], vec![0.0; 54], vec![0.0; 2]).unwrap();
        assert_eq!(conv.ifm().shape().dims, [4, 5, 3]);
        assert_eq!(conv.kernel().shape().dims, [2, 3, 3, 3]);
        assert_eq!(conv.biases().len(), 2);
        assert_eq!(conv.ofm().shape().dims, [2, 3, 2]);
    }

    #[test]
    fn conv_output_dims() {
        assert_eq!(Convolutional::output_dims_for([7, 7, 3], [3, 3], 2, 4).unwrap(), [3, 3, 4]);
        assert_eq!(Convolutional::output_dims_for([5, 4, 1], [3, 2], 1, 1).unwrap(), [3, 3, 1]);
        assert!(Convolutional::output_dims_for([2, 2, 1], [3, 3], 1, 1).is_err());
    }

    #[test]
    fn receptive_field_len() {
        let conv = Convolutional::new([4, 4, 3], [2, 2, 1], [3, 3], 1, vec![0.0; 48], vec![0.0; 27], vec![0.0; 1]).unwrap();
        assert_eq!(conv.receptive_field_len(), 27);
        assert_eq!(conv.ofm_dims(), [2, 2, 1]);
    }

    #[test]
    fn tagged_record_resolution() {
        let fc = FullyConnected::new(1, 1, vec![1.0], vec![1.0], vec![0.0]).unwrap();
        let mut params = LayerParameters::fully_connected(fc);
        // a conv structure under an FC tag is ignored
        params.convolutional = Some(
            Convolutional::new([1, 1, 1], [1, 1, 1], [1, 1], 1, vec![1.0], vec![1.0], vec![0.0]).unwrap(),
        );
        assert_eq!(params.selected_mut().unwrap().layer_type(), LayerType::FullyConnected);

        let mut missing = LayerParameters { layer_type: 0x01, ..Default::default() };
        assert!(matches!(missing.selected_mut(), Err(EmulatorError::InvalidLayer { .. })));

        let mut unknown = LayerParameters { layer_type: 0x7f, ..Default::default() };
        assert!(matches!(unknown.selected_mut(), Err(EmulatorError::UnrecognizedLayerType { tag: 0x7f })));
    }
}
