// SPDX-License-Identifier: AGPL-3.0-only

//! Buffer-tiled emulator for a fixed-function neural-network accelerator.
//!
//! The accelerator has three fixed-capacity on-chip buffers (input, weight,
//! output) and an array of `m_o` lanes, each fed by `m_i` multipliers. A
//! layer too large for the buffers is cut into tiles; each tile is loaded,
//! run through one compute pass, and its partial sums carried in the output
//! buffer until the final input tile, where the activation unit fires.
//!
//! # Components
//!
//! ```text
//! Layer ──▶ dispatch ──▶ tiling::{fc, conv} ──▶ engine (m_o × m_i)
//!                               │                    │
//!                               └──▶ BufferModel ◀───┘
//!                                    input / weight / output
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`buffers`] | Buffers, tile registers, allocate/release lifecycle |
//! | [`tiling`] | FC and convolution tile walks, address translation |
//! | [`dispatch`] | Route a layer (or tagged record) to its tiling path |
//! | [`backend`] | [`Emulator`] facade and the untiled [`ReferenceBackend`] |
//! | [`tensor`] | Row-major tensors, views, windows |
//!
//! # Quick start
//!
//! ```
//! use ffaccel_emu::prelude::*;
//!
//! # fn main() -> ffaccel_emu::Result<()> {
//! let mut emu = Emulator::new(HardwareConfig::default())?;
//! let mut layer = Layer::from(FullyConnected::new(
//!     3,
//!     2,
//!     vec![1.0, 2.0, 3.0],
//!     vec![1.0, 0.0, 0.0, 0.0, 0.0, -1.0],
//!     vec![0.5, 0.0],
//! )?);
//!
//! emu.allocate_buffers()?;
//! let stats = emu.evaluate(&mut layer)?;
//! emu.release_buffers()?;
//!
//! assert_eq!(layer.outputs().as_slice(), &[1.5, 0.0]);
//! println!("{stats}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backend;
pub mod buffers;
pub mod config;
pub mod dispatch;
mod engine;
mod error;
pub mod layer;
pub mod reference;
pub mod stats;
pub mod tensor;
pub mod tiling;

pub use backend::{select_backend, BackendSelection, BackendType, Emulator, LayerBackend, ReferenceBackend};
pub use buffers::{BufferModel, BufferSession, TileRegisters};
pub use config::HardwareConfig;
pub use error::{EmulatorError, Result};
pub use ffaccel_hw::{Activation, HardwareProfile};
pub use layer::{Convolutional, FullyConnected, Layer, LayerMut, LayerParameters, LayerType};
pub use stats::PassStats;
pub use tensor::{Shape, Tensor};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Activation, Convolutional, Emulator, EmulatorError, FullyConnected, HardwareConfig,
        Layer, LayerBackend, LayerParameters, PassStats, ReferenceBackend, Result,
    };
}
