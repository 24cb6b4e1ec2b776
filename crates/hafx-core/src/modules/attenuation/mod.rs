mod parser;

use crate::domain::{EnergyGrid, HafxError, HafxResult};
use crate::modules::spectrum::FlareSpectrum;
use crate::numerics::interpolate_log_log;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use tracing::debug;

pub use parser::parse_nist_source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttenuationProcess {
    Photoelectric,
    Rayleigh,
    Compton,
}

impl AttenuationProcess {
    pub const ALL: [Self; 3] = [Self::Photoelectric, Self::Rayleigh, Self::Compton];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Photoelectric => "photoelectric",
            Self::Rayleigh => "rayleigh",
            Self::Compton => "compton",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Photoelectric => 0,
            Self::Rayleigh => 1,
            Self::Compton => 2,
        }
    }
}

impl Display for AttenuationProcess {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Mass attenuation coefficients (cm²/g) per process on a shared energy grid.
///
/// Tables are value objects: `interpolate` builds a new table and never
/// touches the source.
#[derive(Debug, Clone, PartialEq)]
pub struct AttenuationTable {
    energies: EnergyGrid,
    coefficients: [Vec<f64>; 3],
}

impl AttenuationTable {
    pub fn new(
        energies: Vec<f64>,
        photoelectric: Vec<f64>,
        rayleigh: Vec<f64>,
        compton: Vec<f64>,
    ) -> HafxResult<Self> {
        let energies = EnergyGrid::new(energies).map_err(|error| {
            HafxError::invalid_table("INPUT.ATTENUATION_GRID", error.message().to_string())
        })?;
        let coefficients = [photoelectric, rayleigh, compton];

        for process in AttenuationProcess::ALL {
            let values = &coefficients[process.index()];
            if values.len() != energies.len() {
                return Err(HafxError::invalid_table(
                    "INPUT.ATTENUATION_LENGTH",
                    format!(
                        "{} column has {} values for {} energies",
                        process,
                        values.len(),
                        energies.len()
                    ),
                ));
            }
            if let Some((index, value)) = values
                .iter()
                .copied()
                .enumerate()
                .find(|(_, value)| !value.is_finite() || *value <= 0.0)
            {
                return Err(HafxError::invalid_table(
                    "INPUT.ATTENUATION_VALUE",
                    format!("{process} coefficient at index {index} must be finite and > 0, got {value}"),
                ));
            }
        }

        Ok(Self {
            energies,
            coefficients,
        })
    }

    /// Tab-delimited NIST export: energy, photoelectric, Rayleigh, Compton.
    pub fn from_nist_file(path: impl AsRef<Path>) -> HafxResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| {
            HafxError::io_system(
                "IO.ATTENUATION_READ",
                format!(
                    "failed to read attenuation table '{}': {}",
                    path.display(),
                    source
                ),
            )
        })?;
        parse_nist_source(&source).map_err(|error| {
            HafxError::new(
                error.kind(),
                error.placeholder(),
                format!("{}: {}", path.display(), error.message()),
            )
        })
    }

    pub fn from_nist_source(source: &str) -> HafxResult<Self> {
        parse_nist_source(source)
    }

    pub fn energies(&self) -> &EnergyGrid {
        &self.energies
    }

    pub fn coefficients(&self, process: AttenuationProcess) -> &[f64] {
        &self.coefficients[process.index()]
    }

    /// Sum over all three processes at grid point `index`.
    pub fn total(&self, index: usize) -> f64 {
        self.coefficients.iter().map(|values| values[index]).sum()
    }

    pub fn total_coefficients(&self) -> Vec<f64> {
        (0..self.energies.len())
            .map(|index| self.total(index))
            .collect()
    }

    pub fn interpolate(&self, target: &EnergyGrid) -> HafxResult<Self> {
        debug!(
            source_points = self.energies.len(),
            target_points = target.len(),
            "interpolating attenuation table"
        );

        let mut coefficients: [Vec<f64>; 3] = Default::default();
        for process in AttenuationProcess::ALL {
            coefficients[process.index()] = interpolate_log_log(
                &self.energies,
                self.coefficients(process),
                target,
            )
            .map_err(|error| {
                let mapped = HafxError::from(error);
                HafxError::new(
                    mapped.kind(),
                    mapped.placeholder(),
                    format!("{process}: {}", mapped.message()),
                )
            })?;
        }

        Ok(Self {
            energies: target.clone(),
            coefficients,
        })
    }

    pub fn interpolate_from(&self, spectrum: &FlareSpectrum) -> HafxResult<Self> {
        self.interpolate(spectrum.energies())
    }
}

#[cfg(test)]
mod tests {
    use super::{AttenuationProcess, AttenuationTable};
    use crate::domain::{EnergyGrid, HafxErrorKind};
    use std::fs;
    use tempfile::TempDir;

    fn power_law(energies: &[f64], amplitude: f64, exponent: f64) -> Vec<f64> {
        energies
            .iter()
            .map(|energy| amplitude * energy.powf(exponent))
            .collect()
    }

    fn sample_table() -> AttenuationTable {
        let energies = vec![1.0, 3.0, 10.0, 40.0, 100.0, 400.0];
        AttenuationTable::new(
            energies.clone(),
            power_law(&energies, 1.2e3, -3.0),
            power_law(&energies, 4.0, -1.8),
            power_law(&energies, 0.2, -0.1),
        )
        .expect("table should build")
    }

    #[test]
    fn interpolating_onto_own_grid_is_identity() {
        let table = sample_table();
        let same = table
            .interpolate(table.energies())
            .expect("identity interpolation should succeed");

        for process in AttenuationProcess::ALL {
            for (lhs, rhs) in table
                .coefficients(process)
                .iter()
                .zip(same.coefficients(process))
            {
                assert!(((lhs - rhs) / lhs).abs() <= 1.0e-14);
            }
        }
    }

    #[test]
    fn power_laws_survive_interpolation() {
        let table = sample_table();
        let target = EnergyGrid::new(vec![1.5, 2.2, 8.0, 55.5, 399.0]).expect("target grid");
        let interpolated = table.interpolate(&target).expect("in-domain interpolation");

        assert_eq!(interpolated.energies(), &target);
        let expected = power_law(&target, 1.2e3, -3.0);
        for (value, expected) in interpolated
            .coefficients(AttenuationProcess::Photoelectric)
            .iter()
            .zip(expected)
        {
            assert!(((value - expected) / expected).abs() <= 1.0e-12);
        }
    }

    #[test]
    fn source_table_is_not_mutated() {
        let table = sample_table();
        let before = table.clone();
        let target = EnergyGrid::new(vec![2.0, 20.0]).expect("target grid");
        let _ = table.interpolate(&target).expect("interpolation should succeed");
        assert_eq!(table, before);
    }

    #[test]
    fn out_of_domain_targets_fail_with_extrapolation() {
        let table = sample_table();
        let target = EnergyGrid::new(vec![0.5, 2.0]).expect("target grid");
        let error = table.interpolate(&target).expect_err("below the table");
        assert_eq!(error.kind(), HafxErrorKind::Extrapolation);
        assert!(error.message().starts_with("photoelectric"));
    }

    #[test]
    fn malformed_tables_are_rejected() {
        let cases = [
            (vec![1.0, 2.0], vec![1.0], vec![1.0, 1.0], vec![1.0, 1.0]),
            (vec![1.0, 2.0], vec![1.0, -1.0], vec![1.0, 1.0], vec![1.0, 1.0]),
            (vec![2.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0]),
            (vec![0.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0]),
            (vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0]),
        ];
        for (energies, photo, rayleigh, compton) in cases {
            let error = AttenuationTable::new(energies, photo, rayleigh, compton)
                .expect_err("malformed table should fail");
            assert_eq!(error.kind(), HafxErrorKind::InvalidTable);
        }
    }

    #[test]
    fn total_sums_all_processes() {
        let table = AttenuationTable::new(
            vec![1.0, 2.0],
            vec![1.0, 2.0],
            vec![0.5, 0.25],
            vec![0.1, 0.2],
        )
        .expect("table should build");
        let total = table.total_coefficients();
        assert!((total[0] - 1.6).abs() <= 1.0e-12);
        assert!((total[1] - 2.45).abs() <= 1.0e-12);
        assert_eq!(table.total(1), total[1]);
    }

    #[test]
    fn nist_file_loads_from_disk() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("al.tab");
        fs::write(&path, "1.0\t1.0e3\t1.0\t0.1\n10.0\t1.0\t0.1\t0.15\n").expect("write table");

        let table = AttenuationTable::from_nist_file(&path).expect("table should load");
        let inline = AttenuationTable::from_nist_source("1.0\t1.0e3\t1.0\t0.1\n10.0\t1.0\t0.1\t0.15\n")
            .expect("inline table should parse");
        assert_eq!(table, inline);
        assert_eq!(table.energies().as_slice(), &[1.0, 10.0]);
        assert_eq!(table.coefficients(AttenuationProcess::Compton), &[0.1, 0.15]);

        let error = AttenuationTable::from_nist_file(temp.path().join("missing.tab"))
            .expect_err("missing file should fail");
        assert_eq!(error.kind(), HafxErrorKind::Io);
    }
}
