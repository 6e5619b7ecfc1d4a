// SPDX-License-Identifier: AGPL-3.0-only

//! Control-signal word from the on-chip controller to the compute unit.
//!
//! The controller walks the loaded tile in `m_o × m_i` blocks. For each block
//! it latches a control word describing where the block starts, how many
//! lanes and multipliers are live (clipped at tile edges), and whether the
//! activation unit fires after the block's last multiplier.

/// Register encoding: apply activation after this block.
pub const APPLY_ACTIVATION: u8 = 0x01;

/// Register encoding: leave accumulators un-activated.
pub const NO_ACTIVATION: u8 = 0x00;

/// One block of work for the compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlSignal {
    /// First output lane of the block (relative to the tile).
    pub o_0: usize,
    /// First input column of the block (relative to the tile).
    pub i_0: usize,
    /// Live lanes in this block (`≤ m_o`).
    pub lanes: usize,
    /// Live multipliers per lane in this block (`≤ m_i`).
    pub multipliers: usize,
    /// Fire the activation unit after the last multiplier of each lane.
    pub activation: bool,
}

impl ControlSignal {
    /// Activation bit as the register would hold it.
    #[must_use]
    pub const fn activation_bits(&self) -> u8 {
        if self.activation {
            APPLY_ACTIVATION
        } else {
            NO_ACTIVATION
        }
    }

    /// Multiply-accumulates performed by this block.
    #[must_use]
    pub const fn macs(&self) -> usize {
        self.lanes * self.multipliers
    }
}

/// Whether a block starting at `origin` with `width` live elements is the
/// final block of an axis of length `extent`.
#[must_use]
pub const fn is_final_block(origin: usize, width: usize, extent: usize) -> bool {
    origin + width >= extent
}
