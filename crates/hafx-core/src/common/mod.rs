pub mod config;
pub mod constants;

pub use config::{EnergyBand, EnergyGridConfig, InstrumentConfig, LabelRecoveryPolicy};
