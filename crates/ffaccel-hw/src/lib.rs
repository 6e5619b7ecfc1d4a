// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model for the ffaccel tiled feed-forward accelerator.
//!
//! This crate has **no dependencies** and **no memory of its own**; it is a
//! pure model of the hardware: buffer capacities, the multiply-accumulate
//! array geometry, the controller's control-signal word, and the activation
//! unit.
//!
//! The stateful parts (buffers, tile registers, orchestration) live in
//! `ffaccel-emu`.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`profile`] | Buffer capacities, `m_o` lanes × `m_i` multipliers, presets |
//! | [`signal`] | Control-signal word sent from controller to compute unit |
//! | [`activation`] | Activation unit (rectified linear, identity) |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod activation;
pub mod profile;
pub mod signal;

pub use activation::{relu, Activation, ParseActivationError};
pub use profile::HardwareProfile;
pub use signal::ControlSignal;
