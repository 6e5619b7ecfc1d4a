//! Fully-connected path
//!
//! ```text
//! for ot in output tiles (output_capacity)          tile_height
//!   output_buffer ← biases[ot..]                    accumulation seed
//!   for it in input tiles (input_capacity)          tile_width
//!     input_buffer  ← inputs[it..]
//!     weight_buffer ← weights[(ot, it) .. +(h, w)]   row stride = input_size
//!     apply_activation ← it is the last input tile
//!     pass
//!   outputs[ot..] ← output_buffer
//! ```
//!
//! Weight-buffer row `k`, column `m` holds full-matrix element
//! `(ot + k, it + m)`.

use super::TileSpans;
use crate::buffers::BufferModel;
use crate::engine;
use crate::error::{EmulatorError, Result};
use crate::layer::FullyConnected;
use crate::stats::PassStats;
use tracing::debug;

/// Evaluate a dense layer through the buffers
///
/// Either size being zero dispatches nothing and leaves the outputs as they
/// were.
///
/// # Errors
///
/// Returns a configuration error if the largest weight tile does not fit the
/// weight buffer, or a lifecycle error if the buffers are not allocated.
pub fn feed_forward(
    model: &mut BufferModel,
    layer: &mut FullyConnected,
    stats: &mut PassStats,
) -> Result<()> {
    let input_size = layer.input_size();
    let output_size = layer.output_size();
    if input_size == 0 || output_size == 0 {
        debug!("FC {input_size}→{output_size}: empty, no passes");
        return Ok(());
    }

    let cfg = *model.config();
    let widest = cfg.input_capacity().min(input_size);
    let tallest = cfg.output_capacity().min(output_size);
    if widest * tallest > cfg.weight_capacity() {
        return Err(EmulatorError::configuration(format!(
            "weight buffer holds {} elements, FC tile needs {tallest}×{widest}",
            cfg.weight_capacity()
        )));
    }
    if !model.is_allocated() {
        return Err(EmulatorError::lifecycle("evaluate without allocated buffers"));
    }

    let (inputs, weights, biases, outputs) = layer.split_mut();
    let inputs = inputs.view();
    let weights = weights.view();
    let biases = biases.view();

    for out_tile in TileSpans::new(output_size, cfg.output_capacity()) {
        let (ot, height) = (out_tile.offset, out_tile.extent);
        model.set_tile_height(height);
        biases
            .window(&[ot], &[height])?
            .gather(0, &mut model.buffers_mut()?.output[..height])?;

        for in_tile in TileSpans::new(input_size, cfg.input_capacity()) {
            let (it, width) = (in_tile.offset, in_tile.extent);
            model.set_tile_width(width);
            model.set_apply_activation(in_tile.is_last);

            let buffers = model.buffers_mut()?;
            inputs
                .window(&[it], &[width])?
                .gather(0, &mut buffers.input[..width])?;
            weights
                .window(&[ot, it], &[height, width])?
                .gather(0, &mut buffers.weight[..height * width])?;

            debug!(
                "FC tile out[{ot}..{}] in[{it}..{}] activate={}",
                out_tile.end(),
                in_tile.end(),
                in_tile.is_last
            );
            engine::run_pass(model, stats)?;
        }

        outputs.scatter(&[ot], &[height], &model.output()?[..height])?;
        stats.tiles_written += 1;
    }
    Ok(())
}
