pub mod npy;

pub use npy::{NpyArray, NpyData, NpyError};

use crate::domain::{HafxError, HafxResult};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

const NPY_EXTENSION: &str = ".npy";

/// `printf`-style `%.<precision>e`: two-digit minimum exponent with an
/// explicit sign, e.g. `1.500e-03`.
pub fn format_scientific(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let formatted = format!("{value:.precision$e}");
    let Some((mantissa, exponent)) = formatted.split_once('e') else {
        return formatted;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

/// Writes `<key>.npy` members into a deflate-compressed zip at `path`.
/// Timestamps are pinned so identical records produce identical bytes.
pub fn write_npz_archive(path: &Path, entries: &[(&str, Vec<u8>)]) -> HafxResult<()> {
    let file = File::create(path).map_err(|source| {
        HafxError::io_system(
            "IO.RECORD_WRITE",
            format!("failed to create record '{}': {}", path.display(), source),
        )
    })?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);
    let write_error = |detail: String| {
        HafxError::io_system(
            "IO.RECORD_WRITE",
            format!("failed to write record '{}': {}", path.display(), detail),
        )
    };

    let mut writer = ZipWriter::new(file);
    for (key, bytes) in entries {
        writer
            .start_file(format!("{key}{NPY_EXTENSION}"), options)
            .map_err(|error| write_error(error.to_string()))?;
        writer
            .write_all(bytes)
            .map_err(|error| write_error(error.to_string()))?;
    }
    writer
        .finish()
        .map_err(|error| write_error(error.to_string()))?;
    Ok(())
}

/// Reads every `.npy` member of the archive, keyed without the extension.
pub fn read_npz_archive(path: &Path) -> HafxResult<BTreeMap<String, NpyArray>> {
    let file = File::open(path).map_err(|source| {
        HafxError::io_system(
            "IO.RECORD_READ",
            format!("failed to open record '{}': {}", path.display(), source),
        )
    })?;
    let archive_error = |detail: String| {
        HafxError::invalid_record(
            "RECORD.ARCHIVE",
            format!("'{}' is not a readable record: {}", path.display(), detail),
        )
    };

    let mut archive = ZipArchive::new(file).map_err(|error| archive_error(error.to_string()))?;
    let mut arrays = BTreeMap::new();
    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|error| archive_error(error.to_string()))?;
        let Some(key) = member.name().strip_suffix(NPY_EXTENSION).map(str::to_string) else {
            continue;
        };

        let mut bytes = Vec::new();
        member
            .read_to_end(&mut bytes)
            .map_err(|error| archive_error(format!("member '{key}': {error}")))?;
        let array = npy::decode(&bytes).map_err(|error| {
            HafxError::invalid_record("RECORD.NPY", format!("member '{key}': {error}"))
        })?;
        arrays.insert(key, array);
    }
    Ok(arrays)
}

impl From<NpyError> for HafxError {
    fn from(error: NpyError) -> Self {
        HafxError::invalid_record("RECORD.NPY", error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{format_scientific, npy, read_npz_archive, write_npz_archive};
    use crate::domain::HafxErrorKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn scientific_format_pads_exponent() {
        assert_eq!(format_scientific(1.5e-3, 3), "1.500e-03");
        assert_eq!(format_scientific(0.0, 3), "0.000e+00");
        assert_eq!(format_scientific(98765.0, 2), "9.88e+04");
        assert_eq!(format_scientific(-2.5e7, 3), "-2.500e+07");
        assert_eq!(format_scientific(1.0e-120, 1), "1.0e-120");
        assert_eq!(format_scientific(f64::NAN, 3), "nan");
    }

    #[test]
    fn archive_members_round_trip() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("record.npz");
        write_npz_archive(
            &path,
            &[
                ("al_thickness", npy::encode_f64_scalar(0.25)),
                ("energies", npy::encode_f64(&[3], &[1.0, 2.0, 3.0])),
            ],
        )
        .expect("archive should be written");

        let arrays = read_npz_archive(&path).expect("archive should be read");
        assert_eq!(
            arrays.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["al_thickness", "energies"]
        );
        assert_eq!(arrays["al_thickness"].to_f64_scalar(), Ok(0.25));
        assert_eq!(arrays["energies"].to_vector(), Ok(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn repeated_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("record.npz");
        let entries = [("thermal", npy::encode_f64(&[2], &[4.0, 5.0]))];

        write_npz_archive(&path, &entries).expect("first write should succeed");
        let first = fs::read(&path).expect("record should be readable");
        write_npz_archive(&path, &entries).expect("second write should succeed");
        let second = fs::read(&path).expect("record should be readable");

        assert_eq!(first, second);
    }

    #[test]
    fn non_archives_are_invalid_records() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("broken.npz");
        fs::write(&path, b"not a zip").expect("write junk");

        let error = read_npz_archive(&path).expect_err("junk is not an archive");
        assert_eq!(error.kind(), HafxErrorKind::InvalidRecord);

        let error =
            read_npz_archive(&temp.path().join("missing.npz")).expect_err("missing record");
        assert_eq!(error.kind(), HafxErrorKind::Io);
    }
}
