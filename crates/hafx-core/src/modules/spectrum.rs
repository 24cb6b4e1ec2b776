use crate::domain::{EnergyGrid, HafxError, HafxResult};
use crate::modules::thermal::ThermalParameters;
use crate::modules::traits::ThermalSpectrumSource;
use crate::numerics::{bin_midpoints, uniform_energy_edges};
use std::fs;
use std::path::Path;

/// Incident photon flux binned on `energy_edges`, split into thermal and
/// nonthermal parts. `energies` are the bin midpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct FlareSpectrum {
    goes_class: Option<String>,
    energy_edges: Vec<f64>,
    energies: EnergyGrid,
    thermal: Vec<f64>,
    nonthermal: Vec<f64>,
    flare: Vec<f64>,
}

impl FlareSpectrum {
    pub fn new(
        goes_class: Option<String>,
        energy_edges: Vec<f64>,
        thermal: Vec<f64>,
        nonthermal: Vec<f64>,
    ) -> HafxResult<Self> {
        if energy_edges.len() < 3 {
            return Err(HafxError::invalid_input(
                "INPUT.SPECTRUM_EDGES",
                format!(
                    "spectrum needs at least 3 energy edges, got {}",
                    energy_edges.len()
                ),
            ));
        }
        // Edge validation is the same as for bin centres; reuse the grid checks.
        EnergyGrid::new(energy_edges.clone())?;
        let energies = EnergyGrid::new(bin_midpoints(&energy_edges))?;

        for (name, values) in [("thermal", &thermal), ("nonthermal", &nonthermal)] {
            if values.len() != energies.len() {
                return Err(HafxError::invalid_input(
                    "INPUT.SPECTRUM_LENGTH",
                    format!(
                        "{} component has {} values for {} energy bins",
                        name,
                        values.len(),
                        energies.len()
                    ),
                ));
            }
            if let Some(index) = values.iter().position(|value| !value.is_finite()) {
                return Err(HafxError::invalid_input(
                    "INPUT.SPECTRUM_VALUE",
                    format!("{name} component is not finite at bin {index}"),
                ));
            }
        }

        let flare = thermal
            .iter()
            .zip(&nonthermal)
            .map(|(thermal, nonthermal)| thermal + nonthermal)
            .collect();

        Ok(Self {
            goes_class: goes_class.filter(|class| !class.is_empty()),
            energy_edges,
            energies,
            thermal,
            nonthermal,
            flare,
        })
    }

    /// Rebuilds edges from bin centres: inner edges sit halfway between
    /// neighbouring centres and the outer edges mirror the adjacent half-width.
    /// Exact for uniform grids.
    pub fn from_energies(
        goes_class: Option<String>,
        energies: Vec<f64>,
        thermal: Vec<f64>,
        nonthermal: Vec<f64>,
    ) -> HafxResult<Self> {
        let energies = EnergyGrid::new(energies)?;
        let last = energies.len() - 1;

        let mut edges = Vec::with_capacity(energies.len() + 1);
        edges.push(energies[0] - (energies[1] - energies[0]) / 2.0);
        edges.extend(bin_midpoints(&energies));
        edges.push(energies[last] + (energies[last] - energies[last - 1]) / 2.0);

        Self::new(goes_class, edges, thermal, nonthermal)
    }

    /// Four columns per row: lower edge, upper edge, thermal, nonthermal.
    /// Consecutive rows must share edges.
    pub fn from_text_source(goes_class: Option<String>, source: &str) -> HafxResult<Self> {
        let mut edges: Vec<f64> = Vec::new();
        let mut thermal = Vec::new();
        let mut nonthermal = Vec::new();

        for (line_index, line) in source.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let values = trimmed
                .split_whitespace()
                .map(|token| token.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| spectrum_parse_error(line_index + 1, source.to_string()))?;
            let &[low, high, thermal_flux, nonthermal_flux] = values.as_slice() else {
                return Err(spectrum_parse_error(
                    line_index + 1,
                    format!("expected 4 columns, found {}", values.len()),
                ));
            };

            match edges.last().copied() {
                None => edges.push(low),
                Some(previous) if (previous - low).abs() <= 1.0e-9 * previous.abs().max(1.0) => {}
                Some(previous) => {
                    return Err(spectrum_parse_error(
                        line_index + 1,
                        format!("lower edge {low} does not continue previous upper edge {previous}"),
                    ));
                }
            }
            edges.push(high);
            thermal.push(thermal_flux);
            nonthermal.push(nonthermal_flux);
        }

        Self::new(goes_class, edges, thermal, nonthermal)
    }

    pub fn from_text_file(goes_class: Option<String>, path: impl AsRef<Path>) -> HafxResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| {
            HafxError::io_system(
                "IO.SPECTRUM_READ",
                format!("failed to read spectrum '{}': {}", path.display(), source),
            )
        })?;
        Self::from_text_source(goes_class, &source)
    }

    /// Thermal-only spectrum on the uniform grid described by `parameters`.
    pub fn from_thermal_source(
        goes_class: Option<String>,
        parameters: &ThermalParameters,
        source: &dyn ThermalSpectrumSource,
    ) -> HafxResult<Self> {
        let edges = uniform_energy_edges(
            parameters.start_kev,
            parameters.end_kev,
            parameters.step_kev,
        )?;
        let thermal = source.thermal_flux(parameters)?;
        if thermal.len() != edges.len() - 1 {
            return Err(HafxError::invalid_input(
                "INPUT.THERMAL_LENGTH",
                format!(
                    "thermal source returned {} values for {} energy bins",
                    thermal.len(),
                    edges.len() - 1
                ),
            ));
        }
        let nonthermal = vec![0.0; thermal.len()];
        Self::new(goes_class, edges, thermal, nonthermal)
    }

    pub fn goes_class(&self) -> Option<&str> {
        self.goes_class.as_deref()
    }

    pub fn energy_edges(&self) -> &[f64] {
        &self.energy_edges
    }

    pub fn energies(&self) -> &EnergyGrid {
        &self.energies
    }

    pub fn thermal(&self) -> &[f64] {
        &self.thermal
    }

    pub fn nonthermal(&self) -> &[f64] {
        &self.nonthermal
    }

    pub fn flare(&self) -> &[f64] {
        &self.flare
    }

    pub fn bin_count(&self) -> usize {
        self.energies.len()
    }
}

fn spectrum_parse_error(line: usize, message: impl Into<String>) -> HafxError {
    HafxError::invalid_input(
        "INPUT.SPECTRUM_PARSE",
        format!("line {}: {}", line, message.into()),
    )
}
