//! Minimal `.npy` reader and writer for the array kinds a simulation record
//! holds: little-endian `f8` arrays of any rank and `<U` string scalars.

use crate::numerics::DenseMatrix;

pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";
const NPY_HEADER_ALIGNMENT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NpyError {
    #[error("missing NPY magic string")]
    BadMagic,
    #[error("unsupported NPY format version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },
    #[error("NPY data truncated while reading {what}")]
    Truncated { what: &'static str },
    #[error("malformed NPY header: {0}")]
    Header(String),
    #[error("unsupported NPY dtype '{0}'")]
    UnsupportedDtype(String),
    #[error("expected a {expected} array, found shape {shape:?} of {dtype}")]
    Layout {
        expected: &'static str,
        shape: Vec<usize>,
        dtype: &'static str,
    },
    #[error("invalid UTF-32 code point {0:#x}")]
    CodePoint(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NpyData {
    Float64(Vec<f64>),
    Unicode(Vec<String>),
}

impl NpyData {
    fn dtype_name(&self) -> &'static str {
        match self {
            Self::Float64(_) => "f8",
            Self::Unicode(_) => "unicode",
        }
    }
}

/// Decoded array. `data` is stored in file order; `fortran_order` says how
/// to read it back into a matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub fortran_order: bool,
    pub data: NpyData,
}

impl NpyArray {
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    fn layout_error(&self, expected: &'static str) -> NpyError {
        NpyError::Layout {
            expected,
            shape: self.shape.clone(),
            dtype: self.data.dtype_name(),
        }
    }

    /// Accepts 0-d arrays and single-element 1-d arrays.
    pub fn to_f64_scalar(&self) -> Result<f64, NpyError> {
        match &self.data {
            NpyData::Float64(values) if self.shape.len() <= 1 && values.len() == 1 => {
                Ok(values[0])
            }
            _ => Err(self.layout_error("scalar f8")),
        }
    }

    pub fn to_vector(&self) -> Result<Vec<f64>, NpyError> {
        match &self.data {
            NpyData::Float64(values) if self.shape.len() == 1 => Ok(values.clone()),
            _ => Err(self.layout_error("1-d f8")),
        }
    }

    pub fn to_matrix(&self) -> Result<DenseMatrix, NpyError> {
        let (NpyData::Float64(values), &[rows, cols]) = (&self.data, self.shape.as_slice()) else {
            return Err(self.layout_error("2-d f8"));
        };
        if values.len() != rows * cols {
            return Err(self.layout_error("2-d f8"));
        }
        Ok(if self.fortran_order {
            DenseMatrix::from_fn(rows, cols, |row, col| values[col * rows + row])
        } else {
            DenseMatrix::from_fn(rows, cols, |row, col| values[row * cols + col])
        })
    }

    pub fn to_string_scalar(&self) -> Result<String, NpyError> {
        match &self.data {
            NpyData::Unicode(values) if self.shape.len() <= 1 && values.len() == 1 => {
                Ok(values[0].clone())
            }
            _ => Err(self.layout_error("scalar unicode")),
        }
    }
}

pub fn encode_f64(shape: &[usize], values: &[f64]) -> Vec<u8> {
    let mut bytes = encode_header("<f8", shape);
    bytes.reserve(values.len() * std::mem::size_of::<f64>());
    for value in values {
        push_f64(&mut bytes, *value);
    }
    bytes
}

pub fn encode_f64_scalar(value: f64) -> Vec<u8> {
    encode_f64(&[], &[value])
}

/// Writes the matrix in C order.
pub fn encode_matrix(matrix: &DenseMatrix) -> Vec<u8> {
    let values: Vec<f64> = (0..matrix.nrows())
        .flat_map(|row| (0..matrix.ncols()).map(move |col| matrix[(row, col)]))
        .collect();
    encode_f64(&[matrix.nrows(), matrix.ncols()], &values)
}

pub fn encode_string_scalar(value: &str) -> Vec<u8> {
    let width = value.chars().count().max(1);
    let mut bytes = encode_header(&format!("<U{width}"), &[]);
    for ch in value.chars() {
        push_u32(&mut bytes, u32::from(ch));
    }
    for _ in value.chars().count()..width {
        push_u32(&mut bytes, 0);
    }
    bytes
}

pub fn decode(bytes: &[u8]) -> Result<NpyArray, NpyError> {
    if !bytes.starts_with(NPY_MAGIC) {
        return Err(NpyError::BadMagic);
    }
    let mut offset = NPY_MAGIC.len();
    let major = take_u8(bytes, &mut offset).ok_or(NpyError::Truncated { what: "version" })?;
    let minor = take_u8(bytes, &mut offset).ok_or(NpyError::Truncated { what: "version" })?;
    let header_len = match major {
        1 => take_u16(bytes, &mut offset).map(usize::from),
        2 | 3 => take_u32(bytes, &mut offset).map(|len| len as usize),
        _ => return Err(NpyError::UnsupportedVersion { major, minor }),
    }
    .ok_or(NpyError::Truncated {
        what: "header length",
    })?;

    let header_end = offset
        .checked_add(header_len)
        .filter(|end| *end <= bytes.len())
        .ok_or(NpyError::Truncated { what: "header" })?;
    let header = std::str::from_utf8(&bytes[offset..header_end])
        .map_err(|error| NpyError::Header(error.to_string()))?;
    let header = parse_header(header)?;
    offset = header_end;

    let count = header
        .shape
        .iter()
        .try_fold(1_usize, |count, dim| count.checked_mul(*dim))
        .ok_or_else(|| NpyError::Header(format!("shape {:?} overflows", header.shape)))?;
    let remaining = bytes.len() - offset;
    let data = match header.descr.as_str() {
        "<f8" | "=f8" => {
            ensure_payload(count, 8, remaining, "f8 data")?;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(take_f64(bytes, &mut offset).ok_or(NpyError::Truncated { what: "f8 data" })?);
            }
            NpyData::Float64(values)
        }
        descr => {
            let width = descr
                .strip_prefix("<U")
                .and_then(|width| width.parse::<usize>().ok())
                .ok_or_else(|| NpyError::UnsupportedDtype(descr.to_string()))?;
            let item_size = width
                .checked_mul(4)
                .ok_or_else(|| NpyError::Header(format!("dtype {descr} overflows")))?;
            ensure_payload(count, item_size, remaining, "unicode data")?;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                let mut value = String::with_capacity(width);
                for _ in 0..width {
                    let code = take_u32(bytes, &mut offset)
                        .ok_or(NpyError::Truncated { what: "unicode data" })?;
                    if code == 0 {
                        continue;
                    }
                    value.push(char::from_u32(code).ok_or(NpyError::CodePoint(code))?);
                }
                values.push(value);
            }
            NpyData::Unicode(values)
        }
    };

    Ok(NpyArray {
        shape: header.shape,
        fortran_order: header.fortran_order,
        data,
    })
}

/// Checks the declared payload against the bytes present before anything
/// is allocated from header-supplied sizes.
fn ensure_payload(
    count: usize,
    item_size: usize,
    remaining: usize,
    what: &'static str,
) -> Result<(), NpyError> {
    match count.checked_mul(item_size) {
        Some(needed) if needed <= remaining => Ok(()),
        Some(_) => Err(NpyError::Truncated { what }),
        None => Err(NpyError::Header(format!(
            "{count} items of {item_size} bytes overflow the addressable size"
        ))),
    }
}

struct NpyHeader {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
}

fn encode_header(descr: &str, shape: &[usize]) -> Vec<u8> {
    let shape = match shape {
        [] => "()".to_string(),
        [single] => format!("({single},)"),
        dims => format!(
            "({})",
            dims.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut header = format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape}, }}");

    // magic + version + u16 length, then the header padded with spaces and
    // terminated by a newline so the data starts on an aligned offset.
    let preamble = NPY_MAGIC.len() + 2 + 2;
    let unpadded = preamble + header.len() + 1;
    let padding = (NPY_HEADER_ALIGNMENT - unpadded % NPY_HEADER_ALIGNMENT) % NPY_HEADER_ALIGNMENT;
    header.extend(std::iter::repeat_n(' ', padding));
    header.push('\n');

    let mut bytes = Vec::with_capacity(preamble + header.len());
    bytes.extend_from_slice(NPY_MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    bytes
}

fn parse_header(header: &str) -> Result<NpyHeader, NpyError> {
    let descr = header_value(header, "descr")?
        .strip_prefix('\'')
        .and_then(|rest| rest.split('\'').next())
        .ok_or_else(|| NpyError::Header(format!("unreadable descr in {header:?}")))?
        .to_string();

    let fortran_order = match header_value(header, "fortran_order")? {
        value if value.starts_with("True") => true,
        value if value.starts_with("False") => false,
        _ => {
            return Err(NpyError::Header(format!(
                "unreadable fortran_order in {header:?}"
            )));
        }
    };

    let shape_source = header_value(header, "shape")?;
    let shape_body = shape_source
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
        .ok_or_else(|| NpyError::Header(format!("unreadable shape in {header:?}")))?;
    let shape = shape_body
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| NpyError::Header(format!("invalid dimension '{dim}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NpyHeader {
        descr,
        fortran_order,
        shape,
    })
}

fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let marker = format!("'{key}':");
    header
        .find(&marker)
        .map(|start| header[start + marker.len()..].trim_start())
        .ok_or_else(|| NpyError::Header(format!("missing '{key}' in {header:?}")))
}

fn push_u32(target: &mut Vec<u8>, value: u32) {
    target.extend_from_slice(&value.to_le_bytes());
}

fn push_f64(target: &mut Vec<u8>, value: f64) {
    target.extend_from_slice(&value.to_le_bytes());
}

fn take_u8(bytes: &[u8], offset: &mut usize) -> Option<u8> {
    let value = *bytes.get(*offset)?;
    *offset += 1;
    Some(value)
}

fn take_u16(bytes: &[u8], offset: &mut usize) -> Option<u16> {
    let end = offset.checked_add(std::mem::size_of::<u16>())?;
    let slice = bytes.get(*offset..end)?;
    let value = u16::from_le_bytes(slice.try_into().ok()?);
    *offset = end;
    Some(value)
}

fn take_u32(bytes: &[u8], offset: &mut usize) -> Option<u32> {
    let end = offset.checked_add(std::mem::size_of::<u32>())?;
    let slice = bytes.get(*offset..end)?;
    let value = u32::from_le_bytes(slice.try_into().ok()?);
    *offset = end;
    Some(value)
}

fn take_f64(bytes: &[u8], offset: &mut usize) -> Option<f64> {
    let end = offset.checked_add(std::mem::size_of::<f64>())?;
    let slice = bytes.get(*offset..end)?;
    let value = f64::from_le_bytes(slice.try_into().ok()?);
    *offset = end;
    Some(value)
}
