// SPDX-License-Identifier: AGPL-3.0-only

//! Untiled reference arithmetic
//!
//! Direct dense and convolution evaluation with no buffer limits. The tiled
//! emulator must agree with these to within float reassociation error.

use crate::layer::{Convolutional, FullyConnected, Layer};
use ffaccel_hw::Activation;

/// `outputs[o] = act(biases[o] + Σ_i weights[o][i] · inputs[i])`
pub fn dense(layer: &mut FullyConnected, activation: Activation) {
    let n = layer.input_size();
    let (inputs, weights, biases, outputs) = layer.split_mut();
    let (inputs, weights, biases) = (inputs.as_slice(), weights.as_slice(), biases.as_slice());

    for (o, out) in outputs.as_mut_slice().iter_mut().enumerate() {
        let row = &weights[o * n..(o + 1) * n];
        let sum: f32 = row.iter().zip(inputs).map(|(w, x)| w * x).sum();
        *out = activation.apply(biases[o] + sum);
    }
}

/// Unpadded strided convolution over `[H, W, D]` maps
pub fn convolve(layer: &mut Convolutional, activation: Activation) {
    let [rows, cols, filters] = layer.ofm_dims();
    let [_, w_i, d_i] = layer.ifm_dims();
    let (k_r, k_c, stride) = (layer.kernel_rows(), layer.kernel_cols(), layer.stride());
    let (ifm, kernel, biases, ofm) = layer.split_mut();
    let (ifm, kernel, biases) = (ifm.as_slice(), kernel.as_slice(), biases.as_slice());
    let out = ofm.as_mut_slice();

    for oy in 0..rows {
        for ox in 0..cols {
            for oz in 0..filters {
                let mut acc = biases[oz];
                for ky in 0..k_r {
                    for kx in 0..k_c {
                        let y = oy * stride + ky;
                        let x = ox * stride + kx;
                        for z in 0..d_i {
                            let a = ifm[(y * w_i + x) * d_i + z];
                            let k = kernel[((oz * k_r + ky) * k_c + kx) * d_i + z];
                            acc += a * k;
                        }
                    }
                }
                out[(oy * cols + ox) * filters + oz] = activation.apply(acc);
            }
        }
    }
}

/// Evaluate any layer directly
pub fn evaluate(layer: &mut Layer, activation: Activation) {
    match layer {
        Layer::FullyConnected(fc) => dense(fc, activation),
        Layer::Convolutional(conv) => convolve(conv, activation),
    }
}
