//! Convolutional path
//!
//! Output tiles are `1 × 1 × tile_depth` columns of the output map. For each
//! one, the receptive field (`K_r × K_c × D_i`, origin `(oy·s, ox·s, 0)`) is
//! streamed through the input buffer and multiplied against the matching
//! kernels, which sit in the weight buffer as a `[D_o, K]` matrix with
//! `K = K_r · K_c · D_i`:
//!
//! ```text
//! for ozt in depth tiles                             tile_height = tile_depth
//!   [kernel-stationary] weight_buffer ← kernel[ozt.., 0..K]
//!   for oy, ox in output positions
//!     output_buffer ← biases[ozt..]
//!     for it in receptive-field tiles (input_capacity)   tile_width
//!       input_buffer ← field[it..]
//!       [streaming] weight_buffer ← kernel[ozt.., it..]
//!       apply_activation ← last field tile
//!       pass
//!     ofm[oy, ox, ozt..] ← output_buffer
//! ```
//!
//! When the whole receptive field fits the input buffer the kernel slice is
//! loaded once per depth tile and stays resident across every output
//! position. Otherwise the kernel columns are streamed alongside the field.

use super::TileSpans;
use crate::buffers::BufferModel;
use crate::engine;
use crate::error::{EmulatorError, Result};
use crate::layer::Convolutional;
use crate::stats::PassStats;
use crate::tensor::Shape;
use tracing::debug;

/// Evaluate a convolution through the buffers
///
/// An empty output map or an empty receptive field dispatches nothing and
/// leaves the output map as it was.
///
/// # Errors
///
/// Returns a configuration error if not even one kernel row fits the weight
/// buffer, or a lifecycle error if the buffers are not allocated.
pub fn feed_forward(
    model: &mut BufferModel,
    layer: &mut Convolutional,
    stats: &mut PassStats,
) -> Result<()> {
    let [rows, cols, filters] = layer.ofm_dims();
    let depth_in = layer.ifm_dims()[2];
    let (k_r, k_c, stride) = (layer.kernel_rows(), layer.kernel_cols(), layer.stride());
    let field_len = layer.receptive_field_len();
    if rows == 0 || cols == 0 || filters == 0 || field_len == 0 {
        debug!("conv {rows}×{cols}×{filters} field={field_len}: empty, no passes");
        return Ok(());
    }

    let cfg = *model.config();
    let chunk = field_len.min(cfg.input_capacity());
    let depth_capacity = cfg.output_capacity().min(cfg.weight_capacity() / chunk.max(1));
    if depth_capacity == 0 || chunk == 0 {
        return Err(EmulatorError::configuration(format!(
            "weight buffer of {} elements cannot hold one {chunk}-wide kernel row",
            cfg.weight_capacity()
        )));
    }
    if !model.is_allocated() {
        return Err(EmulatorError::lifecycle("evaluate without allocated buffers"));
    }
    let stationary = field_len <= cfg.input_capacity();
    debug!(
        "conv {rows}×{cols}×{filters} field={field_len} depth_tile={depth_capacity} stationary={stationary}"
    );

    let (ifm, kernel, biases, ofm) = layer.split_mut();
    let ifm = ifm.view();
    let kernels = kernel.view().reshaped(Shape::new(vec![filters, field_len]))?;
    let biases = biases.view();

    for depth_tile in TileSpans::new(filters, depth_capacity) {
        let (ozt, depth) = (depth_tile.offset, depth_tile.extent);
        model.set_tile_height(depth);
        if stationary {
            kernels
                .window(&[ozt, 0], &[depth, field_len])?
                .gather(0, &mut model.buffers_mut()?.weight[..depth * field_len])?;
        }

        for oy in 0..rows {
            for ox in 0..cols {
                biases
                    .window(&[ozt], &[depth])?
                    .gather(0, &mut model.buffers_mut()?.output[..depth])?;
                let field = ifm.window(&[oy * stride, ox * stride, 0], &[k_r, k_c, depth_in])?;

                for field_tile in TileSpans::new(field_len, cfg.input_capacity()) {
                    let (it, width) = (field_tile.offset, field_tile.extent);
                    model.set_tile_width(width);
                    model.set_apply_activation(field_tile.is_last);

                    let buffers = model.buffers_mut()?;
                    field.gather(it, &mut buffers.input[..width])?;
                    if !stationary {
                        kernels
                            .window(&[ozt, it], &[depth, width])?
                            .gather(0, &mut buffers.weight[..depth * width])?;
                    }
                    engine::run_pass(model, stats)?;
                }

                ofm.scatter(&[oy, ox, ozt], &[1, 1, depth], &model.output()?[..depth])?;
                stats.tiles_written += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HardwareConfig;
    use ffaccel_hw::Activation;

    fn model(cfg: HardwareConfig) -> BufferModel {
        let mut m = BufferModel::new(cfg).unwrap();
        m.allocate().unwrap();
        m
    }

    /// 3×3×1 input 1..9, one 2×2 all-ones kernel, stride 1
    fn box_filter() -> Convolutional {
        #[allow(clippy::cast_precision_loss)]
        let ifm = (1..=9).map(|v| v as f32).collect();
        Convolutional::new([3, 3, 1], [2, 2, 1], [2, 2], 1, ifm, vec![1.0; 4], vec![0.5]).unwrap()
    }

    #[test]
    fn box_filter_sums_receptive_fields() {
        let mut m = model(HardwareConfig::new(4, 4, 1, 1, 2));
        let mut layer = box_filter();
        let mut stats = PassStats::default();
        feed_forward(&mut m, &mut layer, &mut stats).unwrap();

        // 1+2+4+5, 2+3+5+6, 4+5+7+8, 5+6+8+9, plus bias 0.5
        assert_eq!(layer.ofm().as_slice(), &[12.5, 16.5, 24.5, 28.5]);
        assert_eq!(stats.passes, 4);
        assert_eq!(stats.tiles_written, 4);
    }

    #[test]
    fn streaming_field_matches_stationary() {
        let mut stationary = box_filter();
        feed_forward(&mut model(HardwareConfig::new(4, 4, 1, 1, 2)), &mut stationary, &mut PassStats::default()).unwrap();

        // field of 4 streamed through a 3-element input buffer
        let mut streamed = box_filter();
        let mut stats = PassStats::default();
        feed_forward(&mut model(HardwareConfig::new(3, 3, 1, 1, 2)), &mut streamed, &mut stats).unwrap();

        assert_eq!(stationary.ofm(), streamed.ofm());
        assert_eq!(stats.passes, 8);
    }

    #[test]
    fn activation_after_full_field_only() {
        // kernel [-1, -1, 1, 1]: first half of each field is negative
        #[allow(clippy::cast_precision_loss)]
        let ifm = (1..=9).map(|v| v as f32).collect();
        let mut layer =
            Convolutional::new([3, 3, 1], [2, 2, 1], [2, 2], 1, ifm, vec![-1.0, -1.0, 1.0, 1.0], vec![0.0]).unwrap();
        let mut stats = PassStats::default();
        feed_forward(&mut model(HardwareConfig::new(2, 2, 1, 1, 1)), &mut layer, &mut stats).unwrap();

        // (4+5)-(1+2)=6 at every position
        assert_eq!(layer.ofm().as_slice(), &[6.0, 6.0, 6.0, 6.0]);
        assert_eq!(stats.activations, 4);
    }

    #[test]
    fn depth_tiles_cover_all_filters() {
        // 1×1 kernel over 2×2×1 input, 3 filters scaling by 1, 2, 3
        let ifm = vec![1.0, -2.0, 3.0, -4.0];
        let mut layer =
            Convolutional::new([2, 2, 1], [2, 2, 3], [1, 1], 1, ifm, vec![1.0, 2.0, 3.0], vec![0.0; 3]).unwrap();
        let cfg = HardwareConfig::new(1, 2, 2, 1, 1).with_activation(Activation::Identity);
        let mut stats = PassStats::default();
        feed_forward(&mut model(cfg), &mut layer, &mut stats).unwrap();

        assert_eq!(
            layer.ofm().as_slice(),
            &[1.0, 2.0, 3.0, -2.0, -4.0, -6.0, 3.0, 6.0, 9.0, -4.0, -8.0, -12.0]
        );
        // depth tiles [0,2) [2,3) × 4 positions
        assert_eq!(stats.tiles_written, 8);
    }

    #[test]
    fn stride_skips_input_positions() {
        // 4×4×1 input, 1×1 kernel, stride 2 → picks (0,0) (0,2) (2,0) (2,2)
        #[allow(clippy::cast_precision_loss)]
        let ifm = (0..16).map(|v| v as f32).collect();
        let mut layer = Convolutional::new([4, 4, 1], [2, 2, 1], [1, 1], 2, ifm, vec![1.0], vec![0.0]).unwrap();
        feed_forward(&mut model(HardwareConfig::default()), &mut layer, &mut PassStats::default()).unwrap();
        assert_eq!(layer.ofm().as_slice(), &[0.0, 2.0, 8.0, 10.0]);
    }

    #[test]
    fn empty_output_map_untouched() {
        let mut layer = Convolutional::new([3, 3, 1], [0, 2, 1], [2, 2], 1, vec![0.0; 9], vec![1.0; 4], vec![0.0]).unwrap();
        let mut stats = PassStats::default();
        feed_forward(&mut model(HardwareConfig::default()), &mut layer, &mut stats).unwrap();
        assert_eq!(stats.passes, 0);
    }

    #[test]
    fn empty_receptive_field_leaves_output_untouched() {
        // zero input depth: every field is empty
        let mut layer = Convolutional::new([3, 3, 0], [2, 2, 1], [2, 2], 1, vec![], vec![], vec![0.5]).unwrap();
        layer.ofm_mut().as_mut_slice().fill(7.0);
        let mut stats = PassStats::default();
        feed_forward(&mut model(HardwareConfig::default()), &mut layer, &mut stats).unwrap();
        assert_eq!(layer.ofm().as_slice(), &[7.0; 4]);
        assert_eq!(stats, PassStats::default());
    }

    #[test]
    fn weight_buffer_too_small_for_one_kernel_row() {
        let mut layer = box_filter();
        let err = feed_forward(&mut model(HardwareConfig::new(4, 3, 1, 1, 1)), &mut layer, &mut PassStats::default())
            .unwrap_err();
        assert!(matches!(err, EmulatorError::Configuration { .. }));
    }
}
