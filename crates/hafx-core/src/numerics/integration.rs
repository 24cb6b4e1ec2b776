#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrationError {
    #[error("trapezoid input length mismatch: y={y}, x={x}")]
    LengthMismatch { y: usize, x: usize },
}

/// Trapezoidal rule over a (possibly nonuniform) abscissa. Fewer than two
/// samples integrate to zero.
pub fn integrate_trapezoid(y: &[f64], x: &[f64]) -> Result<f64, IntegrationError> {
    if y.len() != x.len() {
        return Err(IntegrationError::LengthMismatch {
            y: y.len(),
            x: x.len(),
        });
    }

    Ok(x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) * 0.5)
        .sum())
}
