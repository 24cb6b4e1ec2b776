pub mod integration;
pub mod interpolation;

pub use integration::{IntegrationError, integrate_trapezoid};
pub use interpolation::{InterpolationError, interpolate_log_log};

use crate::domain::{HafxError, HafxResult};
use faer::Mat;

pub type DenseMatrix = Mat<f64>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatrixError {
    #[error("matrix-vector shape mismatch: matrix is {rows}x{cols}, vector has {len} entries")]
    VectorShape { rows: usize, cols: usize, len: usize },
    #[error("matrix product shape mismatch: {lhs_rows}x{lhs_cols} times {rhs_rows}x{rhs_cols}")]
    ProductShape {
        lhs_rows: usize,
        lhs_cols: usize,
        rhs_rows: usize,
        rhs_cols: usize,
    },
}

pub fn mat_vec(matrix: &DenseMatrix, vector: &[f64]) -> Result<Vec<f64>, MatrixError> {
    if matrix.ncols() != vector.len() {
        return Err(MatrixError::VectorShape {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
            len: vector.len(),
        });
    }

    Ok((0..matrix.nrows())
        .map(|row| {
            vector
                .iter()
                .enumerate()
                .map(|(col, value)| matrix[(row, col)] * value)
                .sum()
        })
        .collect())
}

pub fn mat_mul(lhs: &DenseMatrix, rhs: &DenseMatrix) -> Result<DenseMatrix, MatrixError> {
    if lhs.ncols() != rhs.nrows() {
        return Err(MatrixError::ProductShape {
            lhs_rows: lhs.nrows(),
            lhs_cols: lhs.ncols(),
            rhs_rows: rhs.nrows(),
            rhs_cols: rhs.ncols(),
        });
    }

    Ok(lhs * rhs)
}

pub fn bin_widths(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

pub fn bin_midpoints(edges: &[f64]) -> Vec<f64> {
    edges
        .windows(2)
        .map(|pair| pair[0] + (pair[1] - pair[0]) / 2.0)
        .collect()
}

/// Edges `start, start + step, ...` up to `end`, with the bin count rounded
/// to the nearest integer so `end` survives floating-point step accumulation.
pub fn uniform_energy_edges(start: f64, end: f64, step: f64) -> HafxResult<Vec<f64>> {
    if !(start.is_finite() && end.is_finite() && step.is_finite()) || step <= 0.0 || end <= start
    {
        return Err(HafxError::invalid_input(
            "INPUT.ENERGY_EDGES",
            format!("edges need start < end and step > 0, got start={start} end={end} step={step}"),
        ));
    }

    let bins = ((end - start) / step).round() as usize;
    if bins == 0 {
        return Err(HafxError::invalid_input(
            "INPUT.ENERGY_EDGES",
            format!("step {step} is wider than the range [{start}, {end}]"),
        ));
    }

    Ok((0..=bins).map(|index| start + index as f64 * step).collect())
}

impl From<InterpolationError> for HafxError {
    fn from(error: InterpolationError) -> Self {
        match error {
            InterpolationError::Extrapolation { .. } => {
                HafxError::extrapolation("RUN.EXTRAPOLATION", error.to_string())
            }
            other => HafxError::invalid_table("INPUT.INTERPOLATION_TABLE", other.to_string()),
        }
    }
}

impl From<IntegrationError> for HafxError {
    fn from(error: IntegrationError) -> Self {
        HafxError::internal("SYS.INTEGRATION_SHAPE", error.to_string())
    }
}

impl From<MatrixError> for HafxError {
    fn from(error: MatrixError) -> Self {
        HafxError::internal("SYS.MATRIX_SHAPE", error.to_string())
    }
}
