use crate::domain::HafxResult;
use crate::modules::spectrum::FlareSpectrum;
use crate::modules::thermal::ThermalParameters;
use crate::numerics::DenseMatrix;

/// Physical detector model that turns a spectrum's binning into responses.
///
/// The absorber thickness is passed on every call instead of living on the
/// stack, so one stack can serve many containers.
pub trait DetectorStack {
    fn generate_response(
        &self,
        spectrum: &FlareSpectrum,
        absorber_thickness: f64,
        apply_dispersion: bool,
    ) -> HafxResult<DenseMatrix>;

    fn apply_dispersion(
        &self,
        spectrum: &FlareSpectrum,
        response: &DenseMatrix,
    ) -> HafxResult<DenseMatrix>;
}

/// Anything that can produce a thermal photon flux table, one value per bin
/// of the uniform grid described by the parameters.
pub trait ThermalSpectrumSource {
    fn thermal_flux(&self, parameters: &ThermalParameters) -> HafxResult<Vec<f64>>;
}
