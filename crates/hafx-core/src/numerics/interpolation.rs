#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpolationError {
    #[error("interpolation requires at least 2 knots, got {actual}")]
    InsufficientPoints { actual: usize },
    #[error("interpolation input length mismatch: x={x}, y={y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("knot abscissa must be finite and > 0 at index {index}, got {value}")]
    NonPositiveAbscissa { index: usize, value: f64 },
    #[error("knot abscissae must be strictly increasing, index {index} has {current} after {previous}")]
    NonIncreasingAbscissa {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("knot ordinate must be finite and > 0 at index {index}, got {value}")]
    NonPositiveOrdinate { index: usize, value: f64 },
    #[error("interpolation query must be finite and > 0, got {value}")]
    InvalidQuery { value: f64 },
    #[error("query {value} lies outside the tabulated domain [{min}, {max}]")]
    Extrapolation { value: f64, min: f64, max: f64 },
}

/// Piecewise-linear interpolation in `(ln x, ln y)`, i.e. straight lines on a
/// log-log plot. Queries landing on a knot return the knot value unchanged;
/// queries outside `[x[0], x[last]]` are rejected rather than clamped.
pub fn interpolate_log_log(
    x: &[f64],
    y: &[f64],
    targets: &[f64],
) -> Result<Vec<f64>, InterpolationError> {
    validate_knots(x, y)?;

    let log_x: Vec<f64> = x.iter().map(|value| value.ln()).collect();
    let log_y: Vec<f64> = y.iter().map(|value| value.ln()).collect();
    let min = x[0];
    let max = x[x.len() - 1];

    targets
        .iter()
        .copied()
        .map(|target| {
            if !target.is_finite() || target <= 0.0 {
                return Err(InterpolationError::InvalidQuery { value: target });
            }
            if target < min || target > max {
                return Err(InterpolationError::Extrapolation {
                    value: target,
                    min,
                    max,
                });
            }

            match x.binary_search_by(|probe| probe.total_cmp(&target)) {
                Ok(index) => Ok(y[index]),
                Err(upper) => {
                    let lower = upper - 1;
                    let fraction = (target.ln() - log_x[lower]) / (log_x[upper] - log_x[lower]);
                    Ok((log_y[lower] + (log_y[upper] - log_y[lower]) * fraction).exp())
                }
            }
        })
        .collect()
}

fn validate_knots(x: &[f64], y: &[f64]) -> Result<(), InterpolationError> {
    if x.len() < 2 {
        return Err(InterpolationError::InsufficientPoints { actual: x.len() });
    }
    if x.len() != y.len() {
        return Err(InterpolationError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }

    for (index, value) in x.iter().copied().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            return Err(InterpolationError::NonPositiveAbscissa { index, value });
        }
        if index > 0 && value <= x[index - 1] {
            return Err(InterpolationError::NonIncreasingAbscissa {
                index,
                previous: x[index - 1],
                current: value,
            });
        }
    }

    for (index, value) in y.iter().copied().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            return Err(InterpolationError::NonPositiveOrdinate { index, value });
        }
    }

    Ok(())
}
