//! Compute engine: one hardware pass over a loaded tile
//!
//! Emulates the on-chip controller driving an array of `m_o` lanes, each fed
//! by `m_i` multipliers. The controller walks the tile in lane blocks, and
//! within each lane block in multiplier blocks, latching a
//! [`ControlSignal`] for each block:
//!
//! ```text
//! for ob in (0..tile_height).step_by(m_o)        lane block
//!   for ib in (0..tile_width).step_by(m_i)       multiplier block
//!     output[ob+o] += input[ib+i] · weight[(ob+o)·tile_width + ib+i]
//! ```
//!
//! The activation unit fires on a lane after its last multiplier only when
//! the block is the tile's final column block *and* the orchestrator set the
//! activation-pending register. Partial sums carried across input tiles are
//! therefore never activated early.

use crate::buffers::{BufferModel, Buffers};
use crate::error::Result;
use crate::stats::PassStats;
use ffaccel_hw::signal::is_final_block;
use ffaccel_hw::{Activation, ControlSignal};
use tracing::trace;

/// Run one pass over the tile currently held in the buffers
///
/// # Errors
///
/// Returns a lifecycle error if the buffers are not allocated.
pub(crate) fn run_pass(model: &mut BufferModel, stats: &mut PassStats) -> Result<()> {
    let (config, regs, buffers) = model.split_mut()?;
    let lanes = config.lanes();
    let multipliers = config.multipliers_per_lane();
    let activation = config.activation;
    let (height, width) = (regs.tile_height, regs.tile_width);

    stats.passes += 1;

    for ob in (0..height).step_by(lanes) {
        let live_lanes = lanes.min(height - ob);
        for ib in (0..width).step_by(multipliers) {
            let live_multipliers = multipliers.min(width - ib);
            let signal = ControlSignal {
                o_0: ob,
                i_0: ib,
                lanes: live_lanes,
                multipliers: live_multipliers,
                activation: regs.apply_activation && is_final_block(ib, live_multipliers, width),
            };
            compute_step(&signal, width, buffers, activation, stats);
        }
    }
    Ok(())
}

/// One `m_o × m_i` block of multiply-accumulates
fn compute_step(
    signal: &ControlSignal,
    tile_width: usize,
    buffers: &mut Buffers,
    activation: Activation,
    stats: &mut PassStats,
) {
    let inputs = &buffers.input[signal.i_0..signal.i_0 + signal.multipliers];
    for lane in signal.o_0..signal.o_0 + signal.lanes {
        let row = lane * tile_width + signal.i_0;
        let weights = &buffers.weight[row..row + signal.multipliers];

        let mut acc = buffers.output[lane];
        for (x, w) in inputs.iter().zip(weights) {
            acc += x * w;
        }
        if signal.activation {
            acc = activation.apply(acc);
            stats.activations += 1;
        }
        buffers.output[lane] = acc;
    }

    stats.compute_steps += 1;
    stats.macs += signal.macs() as u64;
    trace!(
        "step o_0={} i_0={} lanes={} mults={} act={:#04x}",
        signal.o_0,
        signal.i_0,
        signal.lanes,
        signal.multipliers,
        signal.activation_bits()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HardwareConfig;

    fn loaded(
        config: HardwareConfig,
        input: &[f32],
        weight: &[f32],
        seed: &[f32],
        apply_activation: bool,
    ) -> BufferModel {
        let mut m = BufferModel::new(config).unwrap();
        m.allocate().unwrap();
        m.set_tile_height(seed.len());
        m.set_tile_width(input.len());
        m.set_apply_activation(apply_activation);
        let b = m.buffers_mut().unwrap();
        b.input[..input.len()].copy_from_slice(input);
        b.weight[..weight.len()].copy_from_slice(weight);
        b.output[..seed.len()].copy_from_slice(seed);
        m
    }

    #[test]
    fn accumulates_from_bias_seed() {
        let cfg = HardwareConfig::new(3, 6, 2, 1, 2).with_activation(Activation::Identity);
        let mut m = loaded(cfg, &[1.0, 2.0, 3.0], &[1.0, 0.0, -1.0, 0.5, 0.5, 0.5], &[0.25, -10.0], true);
        let mut stats = PassStats::default();
        run_pass(&mut m, &mut stats).unwrap();

        let out = m.output().unwrap();
        assert!((out[0] - (0.25 + 1.0 - 3.0)).abs() < 1e-6);
        assert!((out[1] - (-10.0 + 3.0)).abs() < 1e-6);
    }

    #[test]
    fn counts_blocks_with_clipping() {
        let cfg = HardwareConfig::default();
        let mut m = loaded(cfg, &[1.0, 2.0, 3.0], &[0.0; 6], &[0.0, 0.0], true);
        let mut stats = PassStats::default();
        run_pass(&mut m, &mut stats).unwrap();

        // 2 lane blocks × (block of 2 + clipped block of 1)
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.compute_steps, 4);
        assert_eq!(stats.macs, 6);
        assert_eq!(stats.activations, 2);
        assert_eq!(
            stats.compute_steps as usize,
            cfg.profile.steps_per_pass(2, 3)
        );
    }

    #[test]
    fn no_activation_without_pending_flag() {
        let cfg = HardwareConfig::default();
        let mut m = loaded(cfg, &[1.0, 1.0], &[-1.0, -1.0], &[0.0], false);
        let mut stats = PassStats::default();
        run_pass(&mut m, &mut stats).unwrap();

        assert!((m.output().unwrap()[0] + 2.0).abs() < 1e-6);
        assert_eq!(stats.activations, 0);
    }

    #[test]
    fn activation_waits_for_final_column_block() {
        // partial sum after the first block is -5; relu there would lose it
        let cfg = HardwareConfig::new(4, 4, 1, 1, 2);
        let mut m = loaded(cfg, &[1.0, 1.0, 1.0, 1.0], &[0.0, 0.0, 3.0, 3.0], &[-5.0], true);
        let mut stats = PassStats::default();
        run_pass(&mut m, &mut stats).unwrap();

        assert!((m.output().unwrap()[0] - 1.0).abs() < 1e-6);
        assert_eq!(stats.activations, 1);
    }

    #[test]
    fn final_block_when_multipliers_divide_width() {
        let cfg = HardwareConfig::new(4, 4, 1, 1, 2);
        let mut m = loaded(cfg, &[1.0, 1.0, 1.0, 1.0], &[-1.0; 4], &[0.0], true);
        let mut stats = PassStats::default();
        run_pass(&mut m, &mut stats).unwrap();

        assert_eq!(m.output().unwrap()[0], 0.0);
        assert_eq!(stats.activations, 1);
    }

    #[test]
    fn multiple_lanes_per_block() {
        let cfg = HardwareConfig::new(2, 6, 3, 2, 2).with_activation(Activation::Identity);
        // 3 rows × 2 cols, lanes=2 → lane blocks [0,2) [2,3)
        let mut m = loaded(cfg, &[2.0, 3.0], &[1.0, 1.0, 2.0, 0.0, 0.0, -1.0], &[0.0, 1.0, 1.0], true);
        let mut stats = PassStats::default();
        run_pass(&mut m, &mut stats).unwrap();

        let out = m.output().unwrap();
        assert!((out[0] - 5.0).abs() < 1e-6);
        assert!((out[1] - 5.0).abs() < 1e-6);
        assert!((out[2] + 2.0).abs() < 1e-6);
        assert_eq!(stats.compute_steps, 2);
    }

    #[test]
    fn pass_requires_allocation() {
        let mut m = BufferModel::new(HardwareConfig::default()).unwrap();
        let mut stats = PassStats::default();
        assert!(run_pass(&mut m, &mut stats).is_err());
    }
}
