//! Minimal reader/writer for the NumPy `.npy` array format.
//!
//! Writing always produces version 1.0 files holding little-endian `f64`
//! (`'<f8'`) data in C order. Reading accepts 1-D little-endian `f8`/`f4`
//! arrays in version 1.x or 2.x files, which covers per-atom charge tables.

use nalgebra::DMatrix;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const HEADER_ALIGNMENT: usize = 64;

#[derive(Debug, Error)]
pub enum NpyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not an .npy file (bad magic string)")]
    BadMagic,
    #[error("Unsupported .npy version {0}.{1}")]
    UnsupportedVersion(u8, u8),
    #[error("Malformed header: {0}")]
    MalformedHeader(String),
    #[error("Unsupported dtype '{0}' (expected '<f8' or '<f4')")]
    UnsupportedDtype(String),
    #[error("Expected a 1-D array, found shape ({0})")]
    NotOneDimensional(String),
    #[error("Data section holds {found} bytes, expected {expected}")]
    TruncatedData { expected: usize, found: usize },
}

fn write_header(writer: &mut impl Write, shape: &str) -> io::Result<()> {
    let dict = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': {}, }}",
        shape
    );
    // magic(6) + version(2) + header length(2) + dict + trailing newline
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    let header_len = (dict.len() + padding + 1) as u16;

    writer.write_all(MAGIC)?;
    writer.write_all(&[0x01, 0x00])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(dict.as_bytes())?;
    writer.write_all(&vec![b' '; padding])?;
    writer.write_all(b"\n")
}

/// Writes a 1-D `f64` array.
pub fn write_vector(writer: &mut impl Write, values: &[f64]) -> io::Result<()> {
    write_header(writer, &format!("({},)", values.len()))?;
    for value in values {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Writes a 2-D `f64` array in row-major (C) order.
pub fn write_matrix(writer: &mut impl Write, matrix: &DMatrix<f64>) -> io::Result<()> {
    write_header(
        writer,
        &format!("({}, {})", matrix.nrows(), matrix.ncols()),
    )?;
    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            writer.write_all(&matrix[(i, j)].to_le_bytes())?;
        }
    }
    Ok(())
}

pub fn write_vector_to_path<P: AsRef<Path>>(path: P, values: &[f64]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_vector(&mut writer, values)?;
    writer.flush()
}

pub fn write_matrix_to_path<P: AsRef<Path>>(path: P, matrix: &DMatrix<f64>) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_matrix(&mut writer, matrix)?;
    writer.flush()
}

/// Extracts the value of `key` from a header dictionary literal.
fn header_value<'a>(dict: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("'{}':", key);
    let start = dict.find(&pattern)? + pattern.len();
    let rest = dict[start..].trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find([',', '}'])?
    };
    Some(rest[..end].trim())
}

/// Reads a 1-D little-endian floating-point array as `f64`.
pub fn read_vector(reader: &mut impl Read) -> Result<Vec<f64>, NpyError> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(NpyError::BadMagic);
    }
    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        _ => return Err(NpyError::UnsupportedVersion(version[0], version[1])),
    };

    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    let dict = String::from_utf8_lossy(&header);

    let descr = header_value(&dict, "descr")
        .ok_or_else(|| NpyError::MalformedHeader("missing 'descr'".to_string()))?
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string();
    let item_size = match descr.as_str() {
        "<f8" => 8,
        "<f4" => 4,
        _ => return Err(NpyError::UnsupportedDtype(descr)),
    };
    let shape = header_value(&dict, "shape")
        .ok_or_else(|| NpyError::MalformedHeader("missing 'shape'".to_string()))?;
    let dims: Vec<&str> = shape
        .trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect();
    if dims.len() != 1 {
        return Err(NpyError::NotOneDimensional(dims.join(", ")));
    }
    let len: usize = dims[0]
        .parse()
        .map_err(|_| NpyError::MalformedHeader(format!("bad shape '{}'", shape)))?;

    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    let expected = len * item_size;
    if data.len() < expected {
        return Err(NpyError::TruncatedData {
            expected,
            found: data.len(),
        });
    }

    let values = data[..expected]
        .chunks_exact(item_size)
        .map(|chunk| match item_size {
            8 => f64::from_le_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ]),
            _ => f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64,
        })
        .collect();
    Ok(values)
}

pub fn read_vector_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<f64>, NpyError> {
    let mut file = File::open(path)?;
    read_vector(&mut file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_length(bytes: &[u8]) -> usize {
        u16::from_le_bytes([bytes[8], bytes[9]]) as usize
    }

    #[test]
    fn header_is_padded_to_alignment() {
        let mut buf = Vec::new();
        write_vector(&mut buf, &[1.0, 2.0, 3.0]).unwrap();
        let data_start = 10 + header_length(&buf);
        assert_eq!(data_start % HEADER_ALIGNMENT, 0);
        assert_eq!(buf[data_start - 1], b'\n');
        assert_eq!(buf.len(), data_start + 3 * 8);
        let header = std::str::from_utf8(&buf[10..data_start]).unwrap();
        assert!(header.contains("'shape': (3,)"));
        assert!(header.contains("'descr': '<f8'"));
    }

    #[test]
    fn matrix_is_written_in_row_major_order() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let mut buf = Vec::new();
        write_matrix(&mut buf, &m).unwrap();
        let data_start = 10 + header_length(&buf);
        let header = std::str::from_utf8(&buf[10..data_start]).unwrap();
        assert!(header.contains("'shape': (2, 2)"));
        let second = f64::from_le_bytes(buf[data_start + 8..data_start + 16].try_into().unwrap());
        assert_eq!(second, 2.0);
    }

    #[test]
    fn written_vector_can_be_read_back() {
        let values = vec![-0.25, 0.5, 1.0e-3];
        let mut buf = Vec::new();
        write_vector(&mut buf, &values).unwrap();
        assert_eq!(read_vector(&mut buf.as_slice()).unwrap(), values);
    }

    #[test]
    fn reads_single_precision_arrays() {
        let dict = "{'descr': '<f4', 'fortran_order': False, 'shape': (2,), }\n";
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&[1, 0]);
        buf.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        buf.extend_from_slice(dict.as_bytes());
        buf.extend_from_slice(&0.5f32.to_le_bytes());
        buf.extend_from_slice(&(-1.5f32).to_le_bytes());
        assert_eq!(read_vector(&mut buf.as_slice()).unwrap(), vec![0.5, -1.5]);
    }

    #[test]
    fn rejects_bad_magic_and_two_dimensional_arrays() {
        assert!(matches!(
            read_vector(&mut &b"NOTNPY0000"[..]),
            Err(NpyError::BadMagic)
        ));

        let m = DMatrix::from_element(2, 3, 1.0);
        let mut buf = Vec::new();
        write_matrix(&mut buf, &m).unwrap();
        assert!(matches!(
            read_vector(&mut buf.as_slice()),
            Err(NpyError::NotOneDimensional(_))
        ));
    }

    #[test]
    fn truncated_data_is_rejected() {
        let mut buf = Vec::new();
        write_vector(&mut buf, &[1.0, 2.0]).unwrap();
        buf.truncate(buf.len() - 4);
        assert!(matches!(
            read_vector(&mut buf.as_slice()),
            Err(NpyError::TruncatedData { .. })
        ));
    }
}
