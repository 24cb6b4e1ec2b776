use super::CliError;
use hafx_core::common::InstrumentConfig;
use hafx_core::modules::thermal::{IdlBridgeSource, ThermalParameters};
use hafx_core::modules::{FlareSpectrum, HafxStack, SimulationContainer, StackDescription};
use std::path::{Path, PathBuf};

pub(super) fn load_config(path: Option<&Path>) -> Result<InstrumentConfig, CliError> {
    match path {
        Some(path) => InstrumentConfig::from_json_file(path).map_err(CliError::Compute),
        None => Ok(InstrumentConfig::default()),
    }
}

pub(super) fn load_stack(path: &Path, config: &InstrumentConfig) -> Result<HafxStack, CliError> {
    StackDescription::load_stack(path, config.default_resolution).map_err(CliError::Compute)
}

pub(super) fn load_record(
    path: &Path,
    config: &InstrumentConfig,
) -> Result<SimulationContainer, CliError> {
    SimulationContainer::load(path, config).map_err(CliError::Compute)
}

/// Where the thermal component of a simulated spectrum comes from.
pub(super) enum SpectrumSource {
    Table(PathBuf),
    Bridge {
        source: IdlBridgeSource,
        parameters: ThermalParameters,
    },
}

impl SpectrumSource {
    pub(super) fn load(&self, goes_class: Option<String>) -> Result<FlareSpectrum, CliError> {
        let spectrum = match self {
            Self::Table(path) => FlareSpectrum::from_text_file(goes_class, path),
            Self::Bridge { source, parameters } => {
                FlareSpectrum::from_thermal_source(goes_class, parameters, source)
            }
        };
        spectrum.map_err(CliError::Compute)
    }
}

/// Bridge arguments on the configured simulation energy grid.
pub(super) fn bridge_parameters(
    config: &InstrumentConfig,
    plasma_temperature_kev: f64,
    emission_measure: f64,
    relative_abundance: f64,
) -> ThermalParameters {
    ThermalParameters {
        start_kev: config.energy_grid.min_kev,
        end_kev: config.energy_grid.max_kev,
        step_kev: config.energy_grid.step_kev,
        emission_measure,
        plasma_temperature_kev,
        relative_abundance,
    }
}
