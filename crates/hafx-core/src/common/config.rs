//! Instrument configuration shared by the simulation container and the CLI.
//!
//! Every field has a default, so a JSON file only has to name what differs
//! from the stock HaFX setup.

use super::constants::{
    DEFAULT_ENERGY_STEP_KEV, DEFAULT_FRACTIONAL_RESOLUTION, DEFAULT_MAX_ENERGY_KEV,
    DEFAULT_MIN_ENERGY_KEV, DEFAULT_SAVE_DIR, DEFAULT_SINGLE_DETECTOR_AREA_CM2,
    DEFAULT_TRIGGER_MAX_KEV, DEFAULT_TRIGGER_MIN_KEV,
};
use crate::domain::{HafxError, HafxResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Inclusive energy window in keV.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct EnergyBand {
    pub min_kev: f64,
    pub max_kev: f64,
}

impl EnergyBand {
    pub fn contains(&self, energy: f64) -> bool {
        energy >= self.min_kev && energy <= self.max_kev
    }
}

impl Default for EnergyBand {
    fn default() -> Self {
        Self {
            min_kev: DEFAULT_TRIGGER_MIN_KEV,
            max_kev: DEFAULT_TRIGGER_MAX_KEV,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct EnergyGridConfig {
    pub min_kev: f64,
    pub max_kev: f64,
    pub step_kev: f64,
}

impl Default for EnergyGridConfig {
    fn default() -> Self {
        Self {
            min_kev: DEFAULT_MIN_ENERGY_KEV,
            max_kev: DEFAULT_MAX_ENERGY_KEV,
            step_kev: DEFAULT_ENERGY_STEP_KEV,
        }
    }
}

/// What to do when a saved record carries no GOES class entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelRecoveryPolicy {
    /// Take the third-from-last `_` token of the file name.
    #[default]
    RecoverFromFileName,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub trigger_band: EnergyBand,
    pub single_detector_area_cm2: f64,
    pub default_resolution: f64,
    pub energy_grid: EnergyGridConfig,
    pub save_dir: PathBuf,
    pub missing_label_policy: LabelRecoveryPolicy,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            trigger_band: EnergyBand::default(),
            single_detector_area_cm2: DEFAULT_SINGLE_DETECTOR_AREA_CM2,
            default_resolution: DEFAULT_FRACTIONAL_RESOLUTION,
            energy_grid: EnergyGridConfig::default(),
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            missing_label_policy: LabelRecoveryPolicy::default(),
        }
    }
}

impl InstrumentConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> HafxResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| {
            HafxError::io_system(
                "IO.CONFIG_READ",
                format!("failed to read configuration '{}': {}", path.display(), source),
            )
        })?;
        Self::from_json_str(&source).map_err(|error| {
            HafxError::new(
                error.kind(),
                error.placeholder(),
                format!("{}: {}", path.display(), error.message()),
            )
        })
    }

    pub fn from_json_str(source: &str) -> HafxResult<Self> {
        let config: Self = serde_json::from_str(source).map_err(|source| {
            HafxError::invalid_input(
                "INPUT.CONFIG_PARSE",
                format!("failed to parse configuration: {}", source),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HafxResult<()> {
        let band = self.trigger_band;
        if !band.min_kev.is_finite() || !band.max_kev.is_finite() || band.min_kev > band.max_kev {
            return Err(HafxError::invalid_input(
                "INPUT.CONFIG_TRIGGER_BAND",
                format!(
                    "trigger band must be finite with min <= max, got [{}, {}]",
                    band.min_kev, band.max_kev
                ),
            ));
        }

        if !self.single_detector_area_cm2.is_finite() || self.single_detector_area_cm2 < 0.0 {
            return Err(HafxError::invalid_input(
                "INPUT.CONFIG_DETECTOR_AREA",
                format!(
                    "single detector area must be finite and >= 0, got {}",
                    self.single_detector_area_cm2
                ),
            ));
        }

        if !self.default_resolution.is_finite() || self.default_resolution <= 0.0 {
            return Err(HafxError::invalid_input(
                "INPUT.CONFIG_RESOLUTION",
                format!(
                    "default resolution must be finite and > 0, got {}",
                    self.default_resolution
                ),
            ));
        }

        let grid = self.energy_grid;
        if !(grid.min_kev > 0.0 && grid.max_kev > grid.min_kev && grid.step_kev > 0.0)
            || !grid.max_kev.is_finite()
        {
            return Err(HafxError::invalid_input(
                "INPUT.CONFIG_ENERGY_GRID",
                format!(
                    "energy grid needs 0 < min < max and step > 0, got min={} max={} step={}",
                    grid.min_kev, grid.max_kev, grid.step_kev
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{InstrumentConfig, LabelRecoveryPolicy};
    use crate::domain::HafxErrorKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_hafx_instrument() {
        let config = InstrumentConfig::default();
        assert_eq!(config.trigger_band.min_kev, 8.0);
        assert_eq!(config.trigger_band.max_kev, 100.0);
        assert_eq!(config.default_resolution, 0.03);
        assert_eq!(config.save_dir.to_str(), Some("responses-and-areas"));
        assert_eq!(
            config.missing_label_policy,
            LabelRecoveryPolicy::RecoverFromFileName
        );
        config.validate().expect("defaults should validate");
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config = InstrumentConfig::from_json_str(
            r#"{"trigger_band": {"min_kev": 10.0, "max_kev": 50.0}, "missing_label_policy": "fail"}"#,
        )
        .expect("partial config should parse");

        assert_eq!(config.trigger_band.min_kev, 10.0);
        assert_eq!(config.trigger_band.max_kev, 50.0);
        assert_eq!(config.missing_label_policy, LabelRecoveryPolicy::Fail);
        assert_eq!(config.single_detector_area_cm2, 18.49);
    }

    #[test]
    fn inverted_trigger_band_is_rejected() {
        let error = InstrumentConfig::from_json_str(
            r#"{"trigger_band": {"min_kev": 100.0, "max_kev": 8.0}}"#,
        )
        .expect_err("inverted band should fail");
        assert_eq!(error.kind(), HafxErrorKind::InvalidInput);
        assert_eq!(error.placeholder(), "INPUT.CONFIG_TRIGGER_BAND");
    }

    #[test]
    fn config_file_errors_name_the_file() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("instrument.json");
        fs::write(&path, "{ not json").expect("config should be written");

        let error = InstrumentConfig::from_json_file(&path).expect_err("parse should fail");
        assert_eq!(error.placeholder(), "INPUT.CONFIG_PARSE");
        assert!(error.message().contains("instrument.json"));

        let missing = InstrumentConfig::from_json_file(temp.path().join("missing.json"))
            .expect_err("missing file should fail");
        assert_eq!(missing.kind(), HafxErrorKind::Io);
    }
}
