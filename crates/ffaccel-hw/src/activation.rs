// SPDX-License-Identifier: AGPL-3.0-only

//! Activation unit.
//!
//! The unit sits at the end of each lane and is applied once per output
//! element, after that element's final partial product.

use std::fmt;
use std::str::FromStr;

/// Activation function wired into the lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    /// Rectified linear: negatives clamp to zero.
    #[default]
    Relu,
    /// Pass-through.
    Identity,
}

impl Activation {
    /// Apply to one accumulator value.
    #[inline]
    #[must_use]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Self::Relu => relu(x),
            Self::Identity => x,
        }
    }
}

/// Rectified linear unit. NaN passes through unchanged.
#[inline]
#[must_use]
pub fn relu(x: f32) -> f32 {
    if x < 0.0 {
        0.0
    } else {
        x
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relu => write!(f, "relu"),
            Self::Identity => write!(f, "identity"),
        }
    }
}

/// Unknown activation name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseActivationError(String);

impl fmt::Display for ParseActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown activation '{}' (expected relu or identity)", self.0)
    }
}

impl std::error::Error for ParseActivationError {}

impl FromStr for Activation {
    type Err = ParseActivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relu" => Ok(Self::Relu),
            "identity" | "none" | "linear" => Ok(Self::Identity),
            _ => Err(ParseActivationError(s.to_string())),
        }
    }
}
