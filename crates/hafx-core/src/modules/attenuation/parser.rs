use super::AttenuationTable;
use crate::domain::{HafxError, HafxResult};

const NIST_COLUMN_COUNT: usize = 4;

/// Parses whitespace- or tab-delimited rows of
/// `energy photoelectric rayleigh compton`. Blank lines and `#` comments are
/// skipped; there is no header row.
pub fn parse_nist_source(source: &str) -> HafxResult<AttenuationTable> {
    let mut columns: [Vec<f64>; NIST_COLUMN_COUNT] = Default::default();

    for (line_index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        if tokens.len() != NIST_COLUMN_COUNT {
            return Err(nist_parse_error(
                line_index + 1,
                format!(
                    "expected {} columns, found {}",
                    NIST_COLUMN_COUNT,
                    tokens.len()
                ),
            ));
        }

        for (column, token) in columns.iter_mut().zip(tokens) {
            let value = parse_numeric_token(token).ok_or_else(|| {
                nist_parse_error(line_index + 1, format!("invalid numeric token '{token}'"))
            })?;
            column.push(value);
        }
    }

    let [energies, photoelectric, rayleigh, compton] = columns;
    AttenuationTable::new(energies, photoelectric, rayleigh, compton)
}

fn parse_numeric_token(token: &str) -> Option<f64> {
    let normalized = token.replace(['D', 'd'], "E");
    normalized.parse::<f64>().ok()
}

fn nist_parse_error(line: usize, message: impl Into<String>) -> HafxError {
    HafxError::invalid_table(
        "INPUT.NIST_PARSE",
        format!("line {}: {}", line, message.into()),
    )
}
