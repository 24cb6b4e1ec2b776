//! Physical and numeric constants shared by the dispersion and response code.

pub const SQRT_TWO_PI: f64 = 2.506_628_274_631_000_502_415_765_284_811_f64;
/// `2 * sqrt(2 * ln 2)`, the FWHM of a unit-sigma Gaussian.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_382_023_138_652_919_f64;

pub const DEFAULT_FRACTIONAL_RESOLUTION: f64 = 0.03;
pub const DEFAULT_TRIGGER_MIN_KEV: f64 = 8.0;
pub const DEFAULT_TRIGGER_MAX_KEV: f64 = 100.0;
pub const DEFAULT_MIN_ENERGY_KEV: f64 = 1.0;
pub const DEFAULT_MAX_ENERGY_KEV: f64 = 300.0;
pub const DEFAULT_ENERGY_STEP_KEV: f64 = 0.1;
/// One 43 mm square scintillator face.
pub const DEFAULT_SINGLE_DETECTOR_AREA_CM2: f64 = 18.49;
pub const DEFAULT_SAVE_DIR: &str = "responses-and-areas";

#[cfg(test)]
mod tests {
    use super::{FWHM_PER_SIGMA, SQRT_TWO_PI};
    use std::f64::consts::{LN_2, PI};

    #[test]
    fn gaussian_constants_match_closed_forms() {
        assert!((SQRT_TWO_PI - (2.0 * PI).sqrt()).abs() <= 1.0e-15);
        assert!((FWHM_PER_SIGMA - 2.0 * (2.0 * LN_2).sqrt()).abs() <= 1.0e-15);
    }
}
