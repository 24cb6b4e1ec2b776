pub mod errors;

pub use errors::{HafxError, HafxErrorCategory, HafxErrorKind, HafxResult};

use std::fmt::{Display, Formatter};
use std::ops::Deref;

/// Strictly increasing, strictly positive energies in keV.
///
/// Every log-space operation in the crate takes one of these, so the
/// positivity check happens once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyGrid {
    values: Vec<f64>,
}

impl EnergyGrid {
    pub fn new(values: Vec<f64>) -> HafxResult<Self> {
        if values.len() < 2 {
            return Err(HafxError::invalid_input(
                "INPUT.ENERGY_GRID_LENGTH",
                format!("energy grid needs at least 2 points, got {}", values.len()),
            ));
        }

        for (index, value) in values.iter().copied().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(HafxError::invalid_input(
                    "INPUT.ENERGY_GRID_VALUE",
                    format!("energy grid entry {index} must be finite and > 0, got {value}"),
                ));
            }
            if index > 0 && value <= values[index - 1] {
                return Err(HafxError::invalid_input(
                    "INPUT.ENERGY_GRID_ORDER",
                    format!(
                        "energy grid must be strictly increasing, index {index} has {value} after {}",
                        values[index - 1]
                    ),
                ));
            }
        }

        Ok(Self { values })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn first(&self) -> f64 {
        self.values[0]
    }

    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }
}

impl Deref for EnergyGrid {
    type Target = [f64];

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulationState {
    Unconfigured,
    Configured,
    Simulated,
    Persisted,
}

impl SimulationState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unconfigured => "UNCONFIGURED",
            Self::Configured => "CONFIGURED",
            Self::Simulated => "SIMULATED",
            Self::Persisted => "PERSISTED",
        }
    }
}

impl Display for SimulationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}
