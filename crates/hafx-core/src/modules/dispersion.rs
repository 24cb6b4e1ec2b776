//! Detector energy-resolution kernels.
//!
//! A kernel `K` is an N×N matrix over the spectrum's bins with
//! `K[(i, j)] = N(i; j, sd_j)`: column `j` is the Gaussian spread of photons
//! whose true energy falls in bin `j`, sampled at integer bin offsets. The
//! dispersed response is therefore `K · R_pure`.
//!
//! Widths are expressed in *index* units because bins are not uniform in
//! energy. Columns are sampled densities, not renormalised to unit sum, so
//! mass near the grid edges is lost rather than redistributed.

use crate::common::constants::{DEFAULT_FRACTIONAL_RESOLUTION, FWHM_PER_SIGMA, SQRT_TWO_PI};
use crate::domain::{HafxError, HafxResult};
use crate::modules::spectrum::FlareSpectrum;
use crate::numerics::{DenseMatrix, bin_midpoints, bin_widths};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    #[error("kernel dimension {dim} does not match {fwhm} FWHM values")]
    DimensionMismatch { dim: usize, fwhm: usize },
    #[error("kernel row {row} is outside dimension {dim}")]
    RowOutOfRange { row: usize, dim: usize },
    #[error("index-space FWHM must be finite and > 0 at bin {index}, got {value}")]
    InvalidWidth { index: usize, value: f64 },
    #[error("fractional resolution must be finite and > 0, got {value}")]
    InvalidResolution { value: f64 },
    #[error("calibration energies must be finite and distinct, got {e1} and {e2}")]
    DegenerateCalibration { e1: f64, e2: f64 },
    #[error("linear resolution model is non-positive on every bin; no floor value exists")]
    NoPositiveResolution,
}

impl From<KernelError> for HafxError {
    fn from(error: KernelError) -> Self {
        match error {
            KernelError::DimensionMismatch { .. } | KernelError::RowOutOfRange { .. } => {
                HafxError::internal("SYS.KERNEL_SHAPE", error.to_string())
            }
            other => HafxError::resolution_model("RUN.RESOLUTION_MODEL", other.to_string()),
        }
    }
}

/// Closed set of detector resolution models.
///
/// Resolutions are fractional FWHM values (FWHM / E); they are turned into
/// index-space widths with `fwhm · midpoint / bin_width`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionModel {
    Fixed {
        resolution: f64,
    },
    /// Straight line through `(e1, fwhm1)` and `(e2, fwhm2)`.
    #[serde(rename = "linear")]
    LinearTwoPoint {
        e1: f64,
        fwhm1: f64,
        e2: f64,
        fwhm2: f64,
    },
}

impl Default for ResolutionModel {
    fn default() -> Self {
        Self::fixed_default()
    }
}

impl ResolutionModel {
    pub const fn fixed_default() -> Self {
        Self::Fixed {
            resolution: DEFAULT_FRACTIONAL_RESOLUTION,
        }
    }

    pub fn fixed(resolution: f64) -> HafxResult<Self> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(KernelError::InvalidResolution { value: resolution }.into());
        }
        Ok(Self::Fixed { resolution })
    }

    pub fn linear(e1: f64, fwhm1: f64, e2: f64, fwhm2: f64) -> HafxResult<Self> {
        let model = Self::LinearTwoPoint {
            e1,
            fwhm1,
            e2,
            fwhm2,
        };
        model.line()?;
        Ok(model)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::LinearTwoPoint { .. } => "linear",
        }
    }

    /// `(slope, intercept)` for the linear model.
    fn line(&self) -> Result<(f64, f64), KernelError> {
        match *self {
            Self::Fixed { resolution } => Ok((0.0, resolution)),
            Self::LinearTwoPoint {
                e1,
                fwhm1,
                e2,
                fwhm2,
            } => {
                if !(e1.is_finite() && e2.is_finite() && fwhm1.is_finite() && fwhm2.is_finite())
                    || e1 == e2
                {
                    return Err(KernelError::DegenerateCalibration { e1, e2 });
                }
                let slope = (fwhm2 - fwhm1) / (e2 - e1);
                Ok((slope, fwhm1 - slope * e1))
            }
        }
    }

    /// Fractional FWHM at each bin midpoint.
    pub fn energy_resolution(&self, midpoints: &[f64]) -> HafxResult<Vec<f64>> {
        match *self {
            Self::Fixed { resolution } => {
                if !resolution.is_finite() || resolution <= 0.0 {
                    return Err(KernelError::InvalidResolution { value: resolution }.into());
                }
                Ok(vec![resolution; midpoints.len()])
            }
            Self::LinearTwoPoint { .. } => {
                let (slope, intercept) = self.line()?;
                let mut values: Vec<f64> = midpoints
                    .iter()
                    .map(|energy| slope * energy + intercept)
                    .collect();
                let floored = apply_resolution_floor(&mut values)?;
                if floored > 0 {
                    warn!(
                        floored_bins = floored,
                        "linear resolution model went non-positive; applied minimum positive floor"
                    );
                }
                Ok(values)
            }
        }
    }

    /// Per-bin FWHM in index units.
    pub fn index_fwhm(&self, energy_edges: &[f64]) -> HafxResult<Vec<f64>> {
        let widths = bin_widths(energy_edges);
        let midpoints = bin_midpoints(energy_edges);
        let resolutions = self.energy_resolution(&midpoints)?;

        Ok(resolutions
            .iter()
            .zip(midpoints.iter().zip(&widths))
            .map(|(resolution, (midpoint, width))| resolution * midpoint / width)
            .collect())
    }

    pub fn build_kernel(&self, energy_edges: &[f64]) -> HafxResult<DenseMatrix> {
        let fwhm = self.index_fwhm(energy_edges)?;
        debug!(model = self.kind(), dim = fwhm.len(), "building dispersion kernel");
        Ok(gaussian_kernel(&fwhm)?)
    }

    /// Kernel for the spectrum's binning; flux values play no part.
    pub fn generate_energy_resolution_given(
        &self,
        spectrum: &FlareSpectrum,
    ) -> HafxResult<DenseMatrix> {
        self.build_kernel(spectrum.energy_edges())
    }
}

/// Replaces every non-positive value with the smallest positive one.
/// Returns how many bins were replaced.
pub fn apply_resolution_floor(values: &mut [f64]) -> Result<usize, KernelError> {
    if values.iter().all(|value| *value > 0.0) {
        return Ok(0);
    }

    let floor = values
        .iter()
        .copied()
        .filter(|value| *value > 0.0)
        .min_by(f64::total_cmp)
        .ok_or(KernelError::NoPositiveResolution)?;

    let mut floored = 0;
    for value in values.iter_mut().filter(|value| **value <= 0.0) {
        *value = floor;
        floored += 1;
    }
    Ok(floored)
}

/// Row `row` of the kernel built from `fwhm`: entry `j` is the density of
/// the Gaussian centred on bin `j` (width `fwhm[j]`) evaluated at `row`.
pub fn gaussian_row(dim: usize, fwhm: &[f64], row: usize) -> Result<Vec<f64>, KernelError> {
    if fwhm.len() != dim {
        return Err(KernelError::DimensionMismatch {
            dim,
            fwhm: fwhm.len(),
        });
    }
    if row >= dim {
        return Err(KernelError::RowOutOfRange { row, dim });
    }
    let sigmas = sigmas_from_fwhm(fwhm)?;

    Ok(sigmas
        .iter()
        .enumerate()
        .map(|(col, sigma)| gaussian_density(row, col, *sigma))
        .collect())
}

pub fn gaussian_kernel(fwhm: &[f64]) -> Result<DenseMatrix, KernelError> {
    let sigmas = sigmas_from_fwhm(fwhm)?;
    let dim = sigmas.len();
    Ok(DenseMatrix::from_fn(dim, dim, |row, col| {
        gaussian_density(row, col, sigmas[col])
    }))
}

fn sigmas_from_fwhm(fwhm: &[f64]) -> Result<Vec<f64>, KernelError> {
    fwhm.iter()
        .copied()
        .enumerate()
        .map(|(index, value)| {
            if value.is_finite() && value > 0.0 {
                Ok(value / FWHM_PER_SIGMA)
            } else {
                Err(KernelError::InvalidWidth { index, value })
            }
        })
        .collect()
}

fn gaussian_density(row: usize, col: usize, sigma: f64) -> f64 {
    let offset = row as f64 - col as f64;
    (-(offset * offset) / (2.0 * sigma * sigma)).exp() / (sigma * SQRT_TWO_PI)
}

#[cfg(test)]
mod tests {
    use super::{
        KernelError, ResolutionModel, apply_resolution_floor, gaussian_kernel, gaussian_row,
    };
    use crate::domain::HafxErrorKind;
    use crate::modules::spectrum::FlareSpectrum;
    use crate::numerics::uniform_energy_edges;

    #[test]
    fn row_mass_concentrates_on_diagonal_as_fwhm_shrinks() {
        let dim = 21;
        let row = 10;
        let mut previous_fraction = 0.0;

        for width in [4.0, 2.0, 1.0, 0.5, 0.2, 0.05] {
            let values = gaussian_row(dim, &vec![width; dim], row).expect("row should build");
            let total: f64 = values.iter().sum();
            let fraction = values[row] / total;
            assert!(
                fraction >= previous_fraction,
                "diagonal fraction should grow: {fraction} after {previous_fraction}"
            );
            previous_fraction = fraction;
        }

        assert!(previous_fraction > 1.0 - 1.0e-12);
    }

    #[test]
    fn kernel_rows_match_gaussian_row() {
        let fwhm = [1.5, 2.0, 2.5, 3.0, 3.5];
        let kernel = gaussian_kernel(&fwhm).expect("kernel should build");
        for row in 0..fwhm.len() {
            let expected = gaussian_row(fwhm.len(), &fwhm, row).expect("row should build");
            for (col, value) in expected.iter().enumerate() {
                assert_eq!(kernel[(row, col)], *value);
            }
        }
    }

    #[test]
    fn columns_peak_on_their_own_bin_without_renormalisation() {
        let dim = 40;
        let kernel = gaussian_kernel(&vec![3.0; dim]).expect("kernel should build");

        for col in 0..dim {
            let peak_row = (0..dim)
                .max_by(|lhs, rhs| kernel[(*lhs, col)].total_cmp(&kernel[(*rhs, col)]))
                .expect("non-empty column");
            assert_eq!(peak_row, col);
        }

        let column_sum = |col: usize| (0..dim).map(|row| kernel[(row, col)]).sum::<f64>();
        assert!((column_sum(20) - 1.0).abs() <= 1.0e-6);
        assert!(column_sum(0) < 0.75);
    }

    #[test]
    fn invalid_widths_and_shapes_are_rejected() {
        assert_eq!(
            gaussian_row(2, &[1.0, 0.0], 0),
            Err(KernelError::InvalidWidth {
                index: 1,
                value: 0.0
            })
        );
        assert_eq!(
            gaussian_row(3, &[1.0, 1.0], 0),
            Err(KernelError::DimensionMismatch { dim: 3, fwhm: 2 })
        );
        assert_eq!(
            gaussian_row(2, &[1.0, 1.0], 2),
            Err(KernelError::RowOutOfRange { row: 2, dim: 2 })
        );
    }

    #[test]
    fn fixed_model_scales_with_midpoint_over_width() {
        let edges = [9.5, 10.5, 11.5, 13.5];
        let fwhm = ResolutionModel::fixed_default()
            .index_fwhm(&edges)
            .expect("fixed model");
        let expected = [0.03 * 10.0, 0.03 * 11.0, 0.03 * 12.5 / 2.0];
        for (value, expected) in fwhm.iter().zip(expected) {
            assert!((value - expected).abs() <= 1.0e-12);
        }
    }

    #[test]
    fn negative_linear_fwhm_is_floored_to_minimum_positive() {
        // fwhm(E) = 0.15 - 0.005 E crosses zero at 30 keV.
        let model = ResolutionModel::linear(10.0, 0.1, 20.0, 0.05).expect("valid calibration");
        let midpoints: Vec<f64> = (0..9).map(|step| 2.5 + step as f64 * 5.0).collect();
        let values = model.energy_resolution(&midpoints).expect("floor should apply");

        let minimum_positive = 0.15 - 0.005 * 27.5;
        for value in &values {
            assert!(*value > 0.0);
            assert!(*value >= minimum_positive - 1.0e-12);
        }
        for floored in &values[6..] {
            assert!((floored - values[5]).abs() <= 1.0e-15);
        }
        assert!((values[5] - minimum_positive).abs() <= 1.0e-12);
        assert!((values[0] - (0.15 - 0.005 * 2.5)).abs() <= 1.0e-12);
    }

    #[test]
    fn all_negative_linear_model_fails() {
        let model = ResolutionModel::linear(10.0, -0.1, 20.0, -0.2).expect("line is defined");
        let error = model
            .energy_resolution(&[5.0, 15.0, 25.0])
            .expect_err("no positive value to floor with");
        assert_eq!(error.kind(), HafxErrorKind::ResolutionModel);

        let mut values = vec![-1.0, 0.0];
        assert_eq!(
            apply_resolution_floor(&mut values),
            Err(KernelError::NoPositiveResolution)
        );
    }

    #[test]
    fn degenerate_calibration_fails() {
        let error = ResolutionModel::linear(10.0, 0.1, 10.0, 0.2).expect_err("same energies");
        assert_eq!(error.kind(), HafxErrorKind::ResolutionModel);
        assert!(ResolutionModel::fixed(0.0).is_err());
    }

    #[test]
    fn kernel_depends_only_on_binning() {
        let edges = uniform_energy_edges(5.0, 15.0, 0.5).expect("edges");
        let bins = edges.len() - 1;
        let bright = FlareSpectrum::new(None, edges.clone(), vec![1.0e6; bins], vec![0.0; bins])
            .expect("bright spectrum");
        let faint = FlareSpectrum::new(None, edges, vec![1.0; bins], vec![3.0; bins])
            .expect("faint spectrum");
        let model = ResolutionModel::linear(5.9, 0.1, 14.4, 0.06).expect("calibration");

        let lhs = model
            .generate_energy_resolution_given(&bright)
            .expect("kernel");
        let rhs = model
            .generate_energy_resolution_given(&faint)
            .expect("kernel");
        assert_eq!(lhs.nrows(), bins);
        assert_eq!(lhs.ncols(), bins);
        for row in 0..bins {
            for col in 0..bins {
                assert_eq!(lhs[(row, col)], rhs[(row, col)]);
            }
        }
    }

    #[test]
    fn models_deserialize_from_tagged_json() {
        let linear: ResolutionModel =
            serde_json::from_str(r#"{"kind":"linear","e1":5.9,"fwhm1":0.1,"e2":662.0,"fwhm2":0.04}"#)
                .expect("linear model");
        assert_eq!(linear.kind(), "linear");

        let fixed: ResolutionModel =
            serde_json::from_str(r#"{"kind":"fixed","resolution":0.05}"#).expect("fixed model");
        assert_eq!(fixed, ResolutionModel::Fixed { resolution: 0.05 });
    }
}
