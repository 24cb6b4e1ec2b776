//! Response-matrix and effective-area simulation for the HaFX solar X-ray
//! detector.

pub mod common;
pub mod domain;
pub mod modules;
pub mod numerics;

pub use common::InstrumentConfig;
pub use domain::{HafxError, HafxErrorCategory, HafxErrorKind, HafxResult, SimulationState};
pub use modules::{
    AttenuationTable, DetectorStack, FlareSpectrum, HafxStack, ResolutionModel,
    SimulationContainer, StackDescription,
};
