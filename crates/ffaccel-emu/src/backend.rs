// SPDX-License-Identifier: AGPL-3.0-only

//! Backend abstraction for layer evaluation
//!
//! Two interchangeable evaluators sit behind [`LayerBackend`]:
//!
//! - [`Emulator`]: tiled through the fixed-capacity buffers, lane by lane
//! - [`ReferenceBackend`]: direct untiled arithmetic with the same activation
//!
//! Running the same layer through both is the parity check used by the
//! tests and the CLI.

use crate::buffers::{BufferModel, BufferSession};
use crate::config::HardwareConfig;
use crate::dispatch;
use crate::error::Result;
use crate::layer::{Layer, LayerParameters};
use crate::reference;
use crate::stats::PassStats;
use std::fmt::Debug;
use tracing::info;

/// Unified interface over emulated and reference evaluation
pub trait LayerBackend: Debug + Send {
    /// Evaluate `layer`, writing its output tensor in place
    ///
    /// # Errors
    ///
    /// Returns error if the layer cannot be evaluated under this backend's
    /// configuration.
    fn evaluate(&mut self, layer: &mut Layer) -> Result<PassStats>;

    /// Get backend type for reporting
    fn backend_type(&self) -> BackendType;

    /// Hardware configuration this backend evaluates under
    fn config(&self) -> &HardwareConfig;
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Buffer-tiled accelerator emulator
    Emulated,

    /// Untiled reference arithmetic
    Reference,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Emulated => write!(f, "Emulated"),
            Self::Reference => write!(f, "Reference"),
        }
    }
}

/// Backend selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendSelection {
    /// Tiled emulator with buffers allocated up front
    #[default]
    Emulated,

    /// Untiled reference
    Reference,
}

/// Build the selected backend for `config`
///
/// The emulator comes back with its buffers already allocated.
///
/// # Errors
///
/// Returns a configuration error for invalid lane geometry, or an
/// allocation error if the emulator's buffers cannot be reserved.
pub fn select_backend(selection: BackendSelection, config: HardwareConfig) -> Result<Box<dyn LayerBackend>> {
    match selection {
        BackendSelection::Emulated => {
            let mut emulator = Emulator::new(config)?;
            emulator.allocate_buffers()?;
            info!("Using emulated backend ({} multipliers)", config.total_multipliers());
            Ok(Box::new(emulator))
        }
        BackendSelection::Reference => {
            config.validate()?;
            info!("Using reference backend");
            Ok(Box::new(ReferenceBackend::new(config)))
        }
    }
}

/// The accelerator emulator
///
/// Owns one [`BufferModel`] and keeps running totals across evaluations.
///
/// ```
/// use ffaccel_emu::{Emulator, FullyConnected, HardwareConfig, Layer, LayerBackend};
///
/// # fn main() -> ffaccel_emu::Result<()> {
/// let mut emu = Emulator::new(HardwareConfig::default())?;
/// emu.allocate_buffers()?;
/// let fc = FullyConnected::new(2, 1, vec![1.0, 2.0], vec![0.5, 0.5], vec![0.0])?;
/// let mut layer = Layer::from(fc);
/// let stats = emu.evaluate(&mut layer)?;
/// assert_eq!(layer.outputs().as_slice(), &[1.5]);
/// assert_eq!(stats.passes, 1);
/// emu.release_buffers()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Emulator {
    model: BufferModel,
    totals: PassStats,
}

impl Emulator {
    /// Create an emulator with unallocated buffers
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero lane or multiplier count.
    pub fn new(config: HardwareConfig) -> Result<Self> {
        Ok(Self {
            model: BufferModel::new(config)?,
            totals: PassStats::default(),
        })
    }

    /// Set buffer capacities and array geometry
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error while buffers are allocated, or a
    /// configuration error for a zero lane or multiplier count.
    pub fn configure_hardware(
        &mut self,
        input_capacity: usize,
        weight_capacity: usize,
        output_capacity: usize,
        lanes: usize,
        multipliers_per_lane: usize,
    ) -> Result<()> {
        self.model
            .configure(input_capacity, weight_capacity, output_capacity, lanes, multipliers_per_lane)
    }

    /// Reserve the buffers
    ///
    /// # Errors
    ///
    /// See [`BufferModel::allocate`].
    pub fn allocate_buffers(&mut self) -> Result<()> {
        self.model.allocate()
    }

    /// Free the buffers
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error without a prior allocate.
    pub fn release_buffers(&mut self) -> Result<()> {
        self.model.release()
    }

    /// Allocate for the lifetime of the returned guard
    ///
    /// # Errors
    ///
    /// See [`BufferModel::allocate`].
    pub fn session(&mut self) -> Result<BufferSession<'_>> {
        self.model.session()
    }

    /// Evaluate a tagged layer record
    ///
    /// # Errors
    ///
    /// Returns an unrecognized-layer-type error for an unknown tag, plus
    /// anything [`LayerBackend::evaluate`] returns.
    pub fn evaluate_tagged(&mut self, params: &mut LayerParameters) -> Result<PassStats> {
        let stats = dispatch::evaluate_tagged(&mut self.model, params)?;
        self.totals += stats;
        Ok(stats)
    }

    /// Buffer model
    pub const fn model(&self) -> &BufferModel {
        &self.model
    }

    /// Statistics summed over every evaluation so far
    pub const fn totals(&self) -> PassStats {
        self.totals
    }
}

impl LayerBackend for Emulator {
    fn evaluate(&mut self, layer: &mut Layer) -> Result<PassStats> {
        let stats = dispatch::evaluate(&mut self.model, layer)?;
        self.totals += stats;
        Ok(stats)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Emulated
    }

    fn config(&self) -> &HardwareConfig {
        self.model.config()
    }
}

/// Untiled reference evaluator
///
/// Ignores capacities; only the configured activation is used.
#[derive(Debug, Clone)]
pub struct ReferenceBackend {
    config: HardwareConfig,
}

impl ReferenceBackend {
    /// Reference evaluator with `config`'s activation
    pub const fn new(config: HardwareConfig) -> Self {
        Self { config }
    }
}

impl LayerBackend for ReferenceBackend {
    fn evaluate(&mut self, layer: &mut Layer) -> Result<PassStats> {
        reference::evaluate(layer, self.config.activation);
        Ok(PassStats::default())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Reference
    }

    fn config(&self) -> &HardwareConfig {
        &self.config
    }
}
