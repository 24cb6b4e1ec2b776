//! One simulation run: an absorber thickness, a flare spectrum, and the pure
//! and dispersed response matrices computed from them.

use crate::common::{InstrumentConfig, LabelRecoveryPolicy};
use crate::domain::{HafxError, HafxResult, SimulationState};
use crate::modules::serialization::{
    NpyArray, format_scientific, npy, read_npz_archive, write_npz_archive,
};
use crate::modules::spectrum::FlareSpectrum;
use crate::modules::traits::DetectorStack;
use crate::numerics::{DenseMatrix, integrate_trapezoid, mat_vec};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const KEY_AL_THICKNESS: &str = "al_thickness";
pub const KEY_THERMAL: &str = "thermal";
pub const KEY_NONTHERMAL: &str = "nonthermal";
pub const KEY_ENERGIES: &str = "energies";
pub const KEY_ENERGY_EDGES: &str = "energy_edges";
pub const KEY_PURE_RESPONSE: &str = "pure_response_matrix";
pub const KEY_DISPERSED_RESPONSE: &str = "dispersed_response_matrix";
pub const KEY_GOES_CLASS: &str = "goes_class";

pub const RECORD_EXTENSION: &str = "npz";

#[derive(Debug, Clone)]
struct Responses {
    pure: DenseMatrix,
    dispersed: DenseMatrix,
}

#[derive(Debug, Clone)]
pub struct SimulationContainer {
    config: InstrumentConfig,
    absorber_thickness: Option<f64>,
    flare_spectrum: Option<FlareSpectrum>,
    responses: Option<Responses>,
    persisted: bool,
}

impl SimulationContainer {
    pub fn new(config: InstrumentConfig) -> Self {
        Self {
            config,
            absorber_thickness: None,
            flare_spectrum: None,
            responses: None,
            persisted: false,
        }
    }

    pub fn with_configuration(
        config: InstrumentConfig,
        absorber_thickness: f64,
        flare_spectrum: FlareSpectrum,
    ) -> HafxResult<Self> {
        let mut container = Self::new(config);
        container.set_absorber_thickness(absorber_thickness)?;
        container.set_flare_spectrum(flare_spectrum);
        Ok(container)
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn state(&self) -> SimulationState {
        match (&self.responses, self.persisted) {
            (Some(_), true) => SimulationState::Persisted,
            (Some(_), false) => SimulationState::Simulated,
            (None, _) if self.absorber_thickness.is_some() && self.flare_spectrum.is_some() => {
                SimulationState::Configured
            }
            (None, _) => SimulationState::Unconfigured,
        }
    }

    pub fn absorber_thickness(&self) -> Option<f64> {
        self.absorber_thickness
    }

    /// Changing the thickness invalidates any computed responses.
    pub fn set_absorber_thickness(&mut self, thickness_cm: f64) -> HafxResult<()> {
        if !thickness_cm.is_finite() || thickness_cm < 0.0 {
            return Err(HafxError::invalid_input(
                "INPUT.ABSORBER_THICKNESS",
                format!("absorber thickness must be finite and >= 0, got {thickness_cm}"),
            ));
        }
        self.absorber_thickness = Some(thickness_cm);
        self.discard_responses();
        Ok(())
    }

    pub fn flare_spectrum(&self) -> Option<&FlareSpectrum> {
        self.flare_spectrum.as_ref()
    }

    pub fn set_flare_spectrum(&mut self, spectrum: FlareSpectrum) {
        self.flare_spectrum = Some(spectrum);
        self.discard_responses();
    }

    fn discard_responses(&mut self) {
        self.responses = None;
        self.persisted = false;
    }

    pub fn pure_response(&self) -> Option<&DenseMatrix> {
        self.responses.as_ref().map(|responses| &responses.pure)
    }

    pub fn dispersed_response(&self) -> Option<&DenseMatrix> {
        self.responses.as_ref().map(|responses| &responses.dispersed)
    }

    pub fn simulate(&mut self, stack: &dyn DetectorStack) -> HafxResult<()> {
        let Some(thickness) = self.absorber_thickness else {
            return Err(HafxError::missing_configuration(
                "RUN.MISSING_THICKNESS",
                "absorber thickness has not been set",
            ));
        };
        let Some(spectrum) = self.flare_spectrum.as_ref() else {
            return Err(HafxError::missing_spectrum(
                "RUN.MISSING_SPECTRUM",
                "flare spectrum has not been set",
            ));
        };

        info!(
            absorber_thickness_cm = thickness,
            goes_class = spectrum.goes_class().unwrap_or("none"),
            bins = spectrum.bin_count(),
            "simulating detector response"
        );
        let pure = stack.generate_response(spectrum, thickness, false)?;
        check_response_shape("pure", &pure, spectrum.bin_count())?;
        let dispersed = stack.apply_dispersion(spectrum, &pure)?;
        check_response_shape("dispersed", &dispersed, spectrum.bin_count())?;

        self.responses = Some(Responses { pure, dispersed });
        self.persisted = false;
        Ok(())
    }

    fn simulated(&self) -> HafxResult<(&Responses, &FlareSpectrum)> {
        let Some(responses) = self.responses.as_ref() else {
            return Err(HafxError::not_simulated(
                "RUN.NOT_SIMULATED",
                "response matrices have not been computed; run simulate first",
            ));
        };
        let Some(spectrum) = self.flare_spectrum.as_ref() else {
            return Err(HafxError::missing_spectrum(
                "RUN.MISSING_SPECTRUM",
                "flare spectrum has not been set",
            ));
        };
        Ok((responses, spectrum))
    }

    /// Dispersed flare counts integrated over the trigger band, for one
    /// detector.
    pub fn trigger_band_count_rate(&self) -> HafxResult<f64> {
        let (responses, spectrum) = self.simulated()?;
        let dispersed_flare = mat_vec(&responses.dispersed, spectrum.flare())?;
        let area = self.config.single_detector_area_cm2;
        let band = self.config.trigger_band;

        let (energies, rates): (Vec<f64>, Vec<f64>) = spectrum
            .energies()
            .iter()
            .zip(&dispersed_flare)
            .filter(|(energy, _)| band.contains(**energy))
            .map(|(energy, rate)| (*energy, rate * area))
            .unzip();
        Ok(integrate_trapezoid(&rates, &energies)?)
    }

    /// Pure response applied to a flat single-detector area. With a positive
    /// threshold the result is all zeros when the trigger-band rate is
    /// strictly above it.
    pub fn compute_effective_area(&self, cps_threshold: f64) -> HafxResult<Vec<f64>> {
        if cps_threshold.is_nan() {
            return Err(HafxError::invalid_input(
                "INPUT.CPS_THRESHOLD",
                "count-rate threshold must be a number",
            ));
        }
        let (responses, spectrum) = self.simulated()?;

        if cps_threshold > 0.0 {
            let rate = self.trigger_band_count_rate()?;
            debug!(rate, cps_threshold, "checking trigger-band count rate");
            if rate > cps_threshold {
                info!(
                    rate,
                    cps_threshold, "trigger-band rate exceeds threshold; effective area is zero"
                );
                return Ok(vec![0.0; spectrum.bin_count()]);
            }
        }

        let area = vec![self.config.single_detector_area_cm2; spectrum.bin_count()];
        Ok(mat_vec(&responses.pure, &area)?)
    }

    /// `<prefix|no_prefix>_<goes_class|no_goes>_<thickness %.3e>cm_hafx`
    pub fn label(&self, prefix: &str) -> HafxResult<String> {
        let Some(thickness) = self.absorber_thickness else {
            return Err(HafxError::missing_configuration(
                "RUN.MISSING_THICKNESS",
                "absorber thickness has not been set",
            ));
        };
        let Some(spectrum) = self.flare_spectrum.as_ref() else {
            return Err(HafxError::missing_spectrum(
                "RUN.MISSING_SPECTRUM",
                "flare spectrum has not been set",
            ));
        };

        let prefix = if prefix.is_empty() { "no_prefix" } else { prefix };
        let goes_class = spectrum.goes_class().unwrap_or("no_goes");
        Ok(format!(
            "{}_{}_{}cm_hafx",
            prefix,
            goes_class,
            format_scientific(thickness, 3)
        ))
    }

    /// Writes `<label>.npz` into `directory`, creating it if needed.
    pub fn save(&mut self, directory: impl AsRef<Path>, prefix: &str) -> HafxResult<PathBuf> {
        let directory = directory.as_ref();
        let (responses, spectrum) = self.simulated()?;
        let label = self.label(prefix)?;
        let thickness = self.absorber_thickness.unwrap_or_default();

        fs::create_dir_all(directory).map_err(|source| {
            HafxError::io_system(
                "IO.RECORD_DIR",
                format!(
                    "failed to create output directory '{}': {}",
                    directory.display(),
                    source
                ),
            )
        })?;

        let mut entries = vec![
            (KEY_AL_THICKNESS, npy::encode_f64_scalar(thickness)),
            (KEY_THERMAL, encode_vector(spectrum.thermal())),
            (KEY_NONTHERMAL, encode_vector(spectrum.nonthermal())),
            (KEY_ENERGIES, encode_vector(spectrum.energies())),
            (KEY_ENERGY_EDGES, encode_vector(spectrum.energy_edges())),
            (KEY_PURE_RESPONSE, npy::encode_matrix(&responses.pure)),
            (KEY_DISPERSED_RESPONSE, npy::encode_matrix(&responses.dispersed)),
        ];
        if let Some(goes_class) = spectrum.goes_class() {
            entries.push((KEY_GOES_CLASS, npy::encode_string_scalar(goes_class)));
        }

        let path = directory.join(format!("{label}.{RECORD_EXTENSION}"));
        write_npz_archive(&path, &entries)?;
        info!(path = %path.display(), "saved simulation record");

        self.persisted = true;
        Ok(path)
    }

    pub fn load(path: impl AsRef<Path>, config: &InstrumentConfig) -> HafxResult<Self> {
        let path = path.as_ref();
        let arrays = read_npz_archive(path)?;

        let thickness = required_entry(&arrays, KEY_AL_THICKNESS, path)?.to_f64_scalar()?;
        let thermal = required_entry(&arrays, KEY_THERMAL, path)?.to_vector()?;
        let nonthermal = required_entry(&arrays, KEY_NONTHERMAL, path)?.to_vector()?;
        let energies = required_entry(&arrays, KEY_ENERGIES, path)?.to_vector()?;

        let goes_class = match arrays.get(KEY_GOES_CLASS) {
            Some(array) => Some(array.to_string_scalar()?),
            None => match config.missing_label_policy {
                LabelRecoveryPolicy::RecoverFromFileName => {
                    let recovered = goes_class_from_file_name(path);
                    warn!(
                        path = %path.display(),
                        recovered = recovered.as_deref().unwrap_or("none"),
                        "record has no GOES class entry; recovered it from the file name"
                    );
                    recovered
                }
                LabelRecoveryPolicy::Fail => {
                    return Err(HafxError::invalid_record(
                        "RECORD.MISSING_LABEL",
                        format!("'{}' has no '{}' entry", path.display(), KEY_GOES_CLASS),
                    ));
                }
            },
        };

        let spectrum = match arrays.get(KEY_ENERGY_EDGES) {
            Some(edges) => FlareSpectrum::new(goes_class, edges.to_vector()?, thermal, nonthermal)?,
            None => FlareSpectrum::from_energies(goes_class, energies.clone(), thermal, nonthermal)?,
        };
        let consistent = spectrum.energies().len() == energies.len()
            && spectrum
                .energies()
                .iter()
                .zip(&energies)
                .all(|(rebuilt, stored)| (rebuilt - stored).abs() <= 1.0e-9 * stored.abs());
        if !consistent {
            return Err(HafxError::invalid_record(
                "RECORD.ENERGY_GRID",
                format!(
                    "'{}' stores energies that are not the midpoints of its edges",
                    path.display()
                ),
            ));
        }

        let pure = required_entry(&arrays, KEY_PURE_RESPONSE, path)?.to_matrix()?;
        let dispersed = required_entry(&arrays, KEY_DISPERSED_RESPONSE, path)?.to_matrix()?;
        for (name, matrix) in [("pure", &pure), ("dispersed", &dispersed)] {
            check_response_shape(name, matrix, spectrum.bin_count()).map_err(|error| {
                HafxError::invalid_record("RECORD.SHAPE", error.message().to_string())
            })?;
        }

        let mut container = Self::with_configuration(config.clone(), thickness, spectrum)?;
        container.responses = Some(Responses { pure, dispersed });
        container.persisted = true;
        info!(path = %path.display(), "loaded simulation record");
        Ok(container)
    }
}

fn encode_vector(values: &[f64]) -> Vec<u8> {
    npy::encode_f64(&[values.len()], values)
}

fn required_entry<'a>(
    arrays: &'a BTreeMap<String, NpyArray>,
    key: &str,
    path: &Path,
) -> HafxResult<&'a NpyArray> {
    arrays.get(key).ok_or_else(|| {
        HafxError::invalid_record(
            "RECORD.MISSING_ENTRY",
            format!("'{}' has no '{}' entry", path.display(), key),
        )
    })
}

fn check_response_shape(name: &str, matrix: &DenseMatrix, bins: usize) -> HafxResult<()> {
    if matrix.nrows() != bins || matrix.ncols() != bins {
        return Err(HafxError::internal(
            "SYS.RESPONSE_SHAPE",
            format!(
                "{} response is {}x{} for {} energy bins",
                name,
                matrix.nrows(),
                matrix.ncols(),
                bins
            ),
        ));
    }
    Ok(())
}

/// Third-from-last `_` token of the record's file name, as written by
/// [`SimulationContainer::label`]. `no_goes` reads back as no class.
pub fn goes_class_from_file_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let mut tokens = file_name.rsplit('_');
    let class = tokens.nth(2)?;
    if class.is_empty() || (class == "goes" && tokens.next() == Some("no")) {
        return None;
    }
    Some(class.to_string())
}
