//! Layer dispatch
//!
//! Routes a layer to the tiling path for its type.

use crate::buffers::BufferModel;
use crate::error::Result;
use crate::layer::{Layer, LayerMut, LayerParameters};
use crate::stats::PassStats;
use crate::tiling;
use tracing::info;

/// Evaluate one layer, writing its output tensor in place
///
/// Returns the statistics of this evaluation only.
///
/// # Errors
///
/// Propagates configuration, lifecycle and shape errors from the tiling
/// path.
pub fn evaluate(model: &mut BufferModel, layer: &mut Layer) -> Result<PassStats> {
    run(model, layer.as_layer_mut())
}

/// Evaluate a tagged layer record in place
///
/// Only the sub-structure selected by the tag is touched.
///
/// # Errors
///
/// Returns an unrecognized-layer-type error for an unknown tag and an
/// invalid-layer error when the selected sub-structure is missing, before
/// any buffer traffic.
pub fn evaluate_tagged(model: &mut BufferModel, params: &mut LayerParameters) -> Result<PassStats> {
    run(model, params.selected_mut()?)
}

fn run(model: &mut BufferModel, layer: LayerMut<'_>) -> Result<PassStats> {
    let mut stats = PassStats::default();
    let kind = layer.layer_type();
    match layer {
        LayerMut::FullyConnected(fc) => tiling::fc::feed_forward(model, fc, &mut stats)?,
        LayerMut::Convolutional(conv) => tiling::conv::feed_forward(model, conv, &mut stats)?,
    }
    info!(
        "{kind} layer done: {} passes, {} steps, {} MACs",
        stats.passes, stats.compute_steps, stats.macs
    );
    Ok(stats)
}
