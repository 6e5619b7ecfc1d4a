//! Cycle-approximate counters
//!
//! One compute step is one `m_o × m_i` block of the array and is counted as
//! one cycle. Copies in and out of the buffers are not costed.

use std::fmt;
use std::ops::AddAssign;

/// Counters for one or more layer evaluations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassStats {
    /// Compute-engine invocations (one per fully loaded tile)
    pub passes: u64,
    /// Lane/multiplier blocks issued (≈ cycles)
    pub compute_steps: u64,
    /// Multiply-accumulates performed
    pub macs: u64,
    /// Activation-unit firings
    pub activations: u64,
    /// Output tiles written back to the full tensor
    pub tiles_written: u64,
}

impl PassStats {
    /// MAC utilisation: performed MACs over `steps × m`
    pub fn utilisation(&self, total_multipliers: usize) -> f64 {
        if self.compute_steps == 0 || total_multipliers == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let peak = (self.compute_steps * total_multipliers as u64) as f64;
        #[allow(clippy::cast_precision_loss)]
        let done = self.macs as f64;
        done / peak
    }
}

impl AddAssign for PassStats {
    fn add_assign(&mut self, rhs: Self) {
        self.passes += rhs.passes;
        self.compute_steps += rhs.compute_steps;
        self.macs += rhs.macs;
        self.activations += rhs.activations;
        self.tiles_written += rhs.tiles_written;
    }
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "passes={} steps={} macs={} activations={} tiles={}",
            self.passes, self.compute_steps, self.macs, self.activations, self.tiles_written
        )
    }
}
