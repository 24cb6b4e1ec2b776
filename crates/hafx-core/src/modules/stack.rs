//! The HaFX detector stack: attenuating layers in front of a scintillator
//! crystal, followed by the crystal's energy resolution.

use crate::domain::{EnergyGrid, HafxError, HafxResult};
use crate::modules::attenuation::{AttenuationProcess, AttenuationTable};
use crate::modules::dispersion::ResolutionModel;
use crate::modules::spectrum::FlareSpectrum;
use crate::modules::traits::DetectorStack;
use crate::numerics::{DenseMatrix, mat_mul};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialLayer {
    name: String,
    density_g_cm3: f64,
    thickness_cm: f64,
    attenuation: AttenuationTable,
}

impl MaterialLayer {
    pub fn new(
        name: impl Into<String>,
        density_g_cm3: f64,
        thickness_cm: f64,
        attenuation: AttenuationTable,
    ) -> HafxResult<Self> {
        let name = name.into();
        if !density_g_cm3.is_finite() || density_g_cm3 <= 0.0 {
            return Err(HafxError::invalid_input(
                "INPUT.LAYER_DENSITY",
                format!("layer '{name}' density must be finite and > 0, got {density_g_cm3}"),
            ));
        }
        validate_thickness(&name, thickness_cm)?;
        Ok(Self {
            name,
            density_g_cm3,
            thickness_cm,
            attenuation,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn density_g_cm3(&self) -> f64 {
        self.density_g_cm3
    }

    pub fn thickness_cm(&self) -> f64 {
        self.thickness_cm
    }

    pub fn attenuation(&self) -> &AttenuationTable {
        &self.attenuation
    }

    /// Fraction of photons passing through `thickness_cm` of this layer.
    pub fn transmission(&self, energies: &EnergyGrid, thickness_cm: f64) -> HafxResult<Vec<f64>> {
        let table = self.attenuation.interpolate(energies)?;
        Ok(table
            .total_coefficients()
            .iter()
            .map(|mu| (-mu * self.density_g_cm3 * thickness_cm).exp())
            .collect())
    }

    /// Fraction of photons photo-absorbed in the layer's own thickness.
    pub fn photoabsorption(&self, energies: &EnergyGrid) -> HafxResult<Vec<f64>> {
        let table = self.attenuation.interpolate(energies)?;
        Ok(table
            .coefficients(AttenuationProcess::Photoelectric)
            .iter()
            .map(|mu| 1.0 - (-mu * self.density_g_cm3 * self.thickness_cm).exp())
            .collect())
    }
}

fn validate_thickness(name: &str, thickness_cm: f64) -> HafxResult<()> {
    if !thickness_cm.is_finite() || thickness_cm < 0.0 {
        return Err(HafxError::invalid_input(
            "INPUT.LAYER_THICKNESS",
            format!("layer '{name}' thickness must be finite and >= 0, got {thickness_cm}"),
        ));
    }
    Ok(())
}

/// Absorbers in beam order, then the crystal. The first absorber's own
/// thickness is never used during simulation: the caller always supplies it.
#[derive(Debug, Clone, PartialEq)]
pub struct HafxStack {
    absorbers: Vec<MaterialLayer>,
    crystal: MaterialLayer,
    resolution: ResolutionModel,
}

impl HafxStack {
    pub fn new(
        absorbers: Vec<MaterialLayer>,
        crystal: MaterialLayer,
        resolution: ResolutionModel,
    ) -> HafxResult<Self> {
        if absorbers.is_empty() {
            return Err(HafxError::invalid_input(
                "INPUT.STACK_ABSORBERS",
                "detector stack needs at least one absorber layer",
            ));
        }
        Ok(Self {
            absorbers,
            crystal,
            resolution,
        })
    }

    pub fn absorbers(&self) -> &[MaterialLayer] {
        &self.absorbers
    }

    pub fn crystal(&self) -> &MaterialLayer {
        &self.crystal
    }

    pub fn resolution(&self) -> &ResolutionModel {
        &self.resolution
    }

    /// Per-bin detection efficiency: transmission through every absorber
    /// times photoabsorption in the crystal.
    pub fn efficiency(
        &self,
        spectrum: &FlareSpectrum,
        absorber_thickness: f64,
    ) -> HafxResult<Vec<f64>> {
        let energies = spectrum.energies();
        let mut efficiency = self.crystal.photoabsorption(energies)?;

        for (index, layer) in self.absorbers.iter().enumerate() {
            let thickness = if index == 0 {
                absorber_thickness
            } else {
                layer.thickness_cm
            };
            let transmission = layer.transmission(energies, thickness)?;
            for (value, transmitted) in efficiency.iter_mut().zip(transmission) {
                *value *= transmitted;
            }
        }
        Ok(efficiency)
    }
}

impl DetectorStack for HafxStack {
    fn generate_response(
        &self,
        spectrum: &FlareSpectrum,
        absorber_thickness: f64,
        apply_dispersion: bool,
    ) -> HafxResult<DenseMatrix> {
        validate_thickness(&self.absorbers[0].name, absorber_thickness)?;
        debug!(
            bins = spectrum.bin_count(),
            absorber_thickness, apply_dispersion, "generating detector response"
        );

        let efficiency = self.efficiency(spectrum, absorber_thickness)?;
        let dim = efficiency.len();
        let pure = DenseMatrix::from_fn(dim, dim, |row, col| {
            if row == col { efficiency[row] } else { 0.0 }
        });

        if apply_dispersion {
            self.apply_dispersion(spectrum, &pure)
        } else {
            Ok(pure)
        }
    }

    fn apply_dispersion(
        &self,
        spectrum: &FlareSpectrum,
        response: &DenseMatrix,
    ) -> HafxResult<DenseMatrix> {
        let kernel = self.resolution.generate_energy_resolution_given(spectrum)?;
        Ok(mat_mul(&kernel, response)?)
    }
}

/// JSON description of a layer; `attenuation_file` is a NIST table, resolved
/// against the description file's directory when relative.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LayerDescription {
    pub name: String,
    pub density_g_cm3: f64,
    #[serde(default)]
    pub thickness_cm: f64,
    pub attenuation_file: PathBuf,
}

impl LayerDescription {
    fn build(&self, base_dir: &Path) -> HafxResult<MaterialLayer> {
        let path = if self.attenuation_file.is_absolute() {
            self.attenuation_file.clone()
        } else {
            base_dir.join(&self.attenuation_file)
        };
        let table = AttenuationTable::from_nist_file(&path)?;
        MaterialLayer::new(self.name.clone(), self.density_g_cm3, self.thickness_cm, table)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StackDescription {
    pub absorbers: Vec<LayerDescription>,
    pub crystal: LayerDescription,
    #[serde(default)]
    pub resolution: Option<ResolutionModel>,
}

impl StackDescription {
    pub fn from_json_str(source: &str) -> HafxResult<Self> {
        serde_json::from_str(source).map_err(|source| {
            HafxError::invalid_input(
                "INPUT.STACK_PARSE",
                format!("failed to parse detector stack: {}", source),
            )
        })
    }

    /// Reads and builds the stack in one step, resolving table paths next to
    /// the description file.
    pub fn load_stack(path: impl AsRef<Path>, default_resolution: f64) -> HafxResult<HafxStack> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| {
            HafxError::io_system(
                "IO.STACK_READ",
                format!("failed to read detector stack '{}': {}", path.display(), source),
            )
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json_str(&source)?.build(base_dir, default_resolution)
    }

    /// A missing resolution falls back to the fixed model at
    /// `default_resolution`.
    pub fn build(&self, base_dir: &Path, default_resolution: f64) -> HafxResult<HafxStack> {
        let absorbers = self
            .absorbers
            .iter()
            .map(|layer| layer.build(base_dir))
            .collect::<HafxResult<Vec<_>>>()?;
        let crystal = self.crystal.build(base_dir)?;
        let resolution = match self.resolution {
            Some(model) => model,
            None => ResolutionModel::fixed(default_resolution)?,
        };
        HafxStack::new(absorbers, crystal, resolution)
    }
}
