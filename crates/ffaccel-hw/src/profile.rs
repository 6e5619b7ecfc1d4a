// SPDX-License-Identifier: AGPL-3.0-only

//! Buffer capacities and multiply-array geometry.
//!
//! ## Array model
//!
//! The compute unit is `m_o` dot-product lanes, each backed by `m_i`
//! physical multipliers. One compute step consumes an `m_o × m_i` block of
//! the weight tile; a tile of `h × w` therefore costs
//! `⌈h / m_o⌉ · ⌈w / m_i⌉` steps.
//!
//! All capacities are counted in elements (`f32`), not bytes.

/// Capacities and array geometry of one accelerator build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareProfile {
    /// Input buffer capacity (elements).
    pub input_capacity: usize,
    /// Weight buffer capacity (elements).
    pub weight_capacity: usize,
    /// Output buffer capacity (elements).
    pub output_capacity: usize,
    /// Parallel output accumulators (`m_o`).
    pub lanes: usize,
    /// Multipliers feeding each lane (`m_i`).
    pub multipliers_per_lane: usize,
}

impl HardwareProfile {
    /// The bring-up profile: 3-element input buffer, 6-element weight
    /// buffer, 2-element output buffer, one lane of two multipliers.
    ///
    /// Small enough that a 5×5 dense layer exercises every clipping edge.
    pub const REFERENCE: Self = Self {
        input_capacity: 3,
        weight_capacity: 6,
        output_capacity: 2,
        lanes: 1,
        multipliers_per_lane: 2,
    };

    /// Total physical multipliers on chip (`m = m_o · m_i`).
    #[must_use]
    pub const fn total_multipliers(&self) -> usize {
        self.lanes * self.multipliers_per_lane
    }

    /// Largest weight tile a dense layer can request
    /// (`output_capacity × input_capacity`).
    #[must_use]
    pub const fn max_dense_weight_tile(&self) -> usize {
        self.output_capacity * self.input_capacity
    }

    /// Compute steps for one pass over a `tile_height × tile_width` tile.
    #[must_use]
    pub const fn steps_per_pass(&self, tile_height: usize, tile_width: usize) -> usize {
        if self.lanes == 0 || self.multipliers_per_lane == 0 {
            return 0;
        }
        tile_height.div_ceil(self.lanes) * tile_width.div_ceil(self.multipliers_per_lane)
    }

    /// Passes needed for a dense layer (`⌈out / oc⌉ · ⌈in / ic⌉`).
    ///
    /// Zero when either size is zero: nothing is dispatched.
    #[must_use]
    pub const fn dense_passes(&self, input_size: usize, output_size: usize) -> usize {
        if self.input_capacity == 0 || self.output_capacity == 0 {
            return 0;
        }
        output_size.div_ceil(self.output_capacity) * input_size.div_ceil(self.input_capacity)
    }
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self::REFERENCE
    }
}
