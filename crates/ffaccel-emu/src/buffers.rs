//! Buffer model: the three on-chip buffers and the tile registers
//!
//! One `BufferModel` is owned per evaluation session and passed by `&mut`
//! to the orchestrator and the compute engine. Nothing here is global, so
//! concurrent evaluations simply use separate instances.
//!
//! ## Lifecycle
//!
//! ```text
//! configure ─▶ allocate ─▶ (evaluate …) ─▶ release ─▶ configure …
//! ```
//!
//! `configure` under live buffers, a second `allocate`, and `release`
//! without `allocate` are lifecycle errors. [`BufferSession`] pairs
//! `allocate`/`release` through `Drop` so every exit path releases.
//!
//! Writes into the buffers are not bounds-checked against the tile
//! registers; the orchestrator never requests a tile larger than capacity.

use crate::config::HardwareConfig;
use crate::error::{EmulatorError, Result};
use std::ops::{Deref, DerefMut};
use tracing::{debug, info, warn};

/// Live tile registers, rewritten by the orchestrator for every tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileRegisters {
    /// Logical rows of the loaded tile (output lanes in use)
    pub tile_height: usize,
    /// Logical columns of the loaded tile (input elements in use)
    pub tile_width: usize,
    /// The loaded input tile is the last one for the current output tile
    pub apply_activation: bool,
}

/// The three fixed-capacity buffers
#[derive(Debug)]
pub(crate) struct Buffers {
    pub(crate) input: Vec<f32>,
    pub(crate) weight: Vec<f32>,
    pub(crate) output: Vec<f32>,
}

/// Owned buffer model for one evaluation session
#[derive(Debug)]
pub struct BufferModel {
    config: HardwareConfig,
    registers: TileRegisters,
    buffers: Option<Buffers>,
}

impl BufferModel {
    /// Create an unallocated buffer model
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the lane geometry is invalid.
    pub fn new(config: HardwareConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registers: TileRegisters::default(),
            buffers: None,
        })
    }

    /// Record new capacities and array geometry, keeping the activation unit
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error while buffers are allocated, or a
    /// configuration error for a zero lane or multiplier count.
    pub fn configure(
        &mut self,
        input_capacity: usize,
        weight_capacity: usize,
        output_capacity: usize,
        lanes: usize,
        multipliers_per_lane: usize,
    ) -> Result<()> {
        let config = HardwareConfig::new(
            input_capacity,
            weight_capacity,
            output_capacity,
            lanes,
            multipliers_per_lane,
        )
        .with_activation(self.config.activation);
        self.reconfigure(config)
    }

    /// Replace the whole configuration
    ///
    /// # Errors
    ///
    /// Same as [`BufferModel::configure`].
    pub fn reconfigure(&mut self, config: HardwareConfig) -> Result<()> {
        if self.buffers.is_some() {
            return Err(EmulatorError::lifecycle(
                "cannot reconfigure capacities while buffers are allocated; release first",
            ));
        }
        config.validate()?;
        self.config = config;
        self.registers = TileRegisters::default();
        Ok(())
    }

    /// Reserve the three buffers at the configured capacities
    ///
    /// # Errors
    ///
    /// Returns an allocation error if any capacity is zero or memory cannot
    /// be reserved, or a lifecycle error if already allocated.
    pub fn allocate(&mut self) -> Result<()> {
        if self.buffers.is_some() {
            return Err(EmulatorError::lifecycle("buffers already allocated"));
        }
        let buffers = Buffers {
            input: reserve("input", self.config.input_capacity())?,
            weight: reserve("weight", self.config.weight_capacity())?,
            output: reserve("output", self.config.output_capacity())?,
        };
        self.buffers = Some(buffers);
        self.registers = TileRegisters::default();
        info!(
            "Buffers allocated: input={} weight={} output={} elements",
            self.config.input_capacity(),
            self.config.weight_capacity(),
            self.config.output_capacity()
        );
        Ok(())
    }

    /// Free the three buffers
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error if the buffers are not allocated.
    pub fn release(&mut self) -> Result<()> {
        if self.buffers.take().is_none() {
            return Err(EmulatorError::lifecycle("release without a prior allocate"));
        }
        self.registers = TileRegisters::default();
        info!("Buffers released");
        Ok(())
    }

    /// Allocate and return a guard that releases on drop
    ///
    /// # Errors
    ///
    /// Same as [`BufferModel::allocate`].
    pub fn session(&mut self) -> Result<BufferSession<'_>> {
        self.allocate()?;
        Ok(BufferSession { model: self })
    }

    /// Whether the buffers are currently allocated
    pub const fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    /// Current configuration
    pub const fn config(&self) -> &HardwareConfig {
        &self.config
    }

    /// Current tile registers
    pub const fn registers(&self) -> TileRegisters {
        self.registers
    }

    /// Input buffer contents (full capacity)
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error if not allocated.
    pub fn input(&self) -> Result<&[f32]> {
        Ok(&self.buffers()?.input)
    }

    /// Weight buffer contents (full capacity)
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error if not allocated.
    pub fn weight(&self) -> Result<&[f32]> {
        Ok(&self.buffers()?.weight)
    }

    /// Output buffer contents (full capacity)
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error if not allocated.
    pub fn output(&self) -> Result<&[f32]> {
        Ok(&self.buffers()?.output)
    }

    pub(crate) fn set_tile_height(&mut self, height: usize) {
        self.registers.tile_height = height;
    }

    pub(crate) fn set_tile_width(&mut self, width: usize) {
        self.registers.tile_width = width;
    }

    pub(crate) fn set_apply_activation(&mut self, apply: bool) {
        self.registers.apply_activation = apply;
    }

    pub(crate) fn buffers_mut(&mut self) -> Result<&mut Buffers> {
        self.buffers
            .as_mut()
            .ok_or_else(|| EmulatorError::lifecycle("buffers are not allocated"))
    }

    /// Registers and buffers borrowed together for one compute pass
    pub(crate) fn split_mut(&mut self) -> Result<(&HardwareConfig, TileRegisters, &mut Buffers)> {
        let buffers = self
            .buffers
            .as_mut()
            .ok_or_else(|| EmulatorError::lifecycle("buffers are not allocated"))?;
        Ok((&self.config, self.registers, buffers))
    }

    fn buffers(&self) -> Result<&Buffers> {
        self.buffers
            .as_ref()
            .ok_or_else(|| EmulatorError::lifecycle("buffers are not allocated"))
    }
}

fn reserve(name: &str, capacity: usize) -> Result<Vec<f32>> {
    if capacity == 0 {
        return Err(EmulatorError::allocation(format!(
            "{name} buffer capacity is zero"
        )));
    }
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity).map_err(|e| {
        EmulatorError::allocation(format!("{name} buffer ({capacity} elements): {e}"))
    })?;
    buf.resize(capacity, 0.0);
    debug!("Reserved {name} buffer: {capacity} elements");
    Ok(buf)
}

/// Scoped allocation: buffers are released when the guard drops
#[derive(Debug)]
pub struct BufferSession<'a> {
    model: &'a mut BufferModel,
}

impl Deref for BufferSession<'_> {
    type Target = BufferModel;

    fn deref(&self) -> &Self::Target {
        self.model
    }
}

impl DerefMut for BufferSession<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.model
    }
}

impl Drop for BufferSession<'_> {
    fn drop(&mut self) {
        if self.model.is_allocated() {
            if let Err(e) = self.model.release() {
                warn!("Session release failed: {e}");
            }
        }
    }
}
