//! Minimal NumPy `.npy` codec for the accelerator transport files.
//!
//! Writes version 1.0, little-endian `f4`, C order. Reads versions 1 to 3 with
//! `f4` or `f8` payloads.

use std::fs;
use std::path::Path;

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use thiserror::Error;

const MAGIC: &[u8] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;

#[derive(Error, Debug)]
pub enum NpyError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Not an .npy file")]
    BadMagic,
    #[error("Unsupported .npy version {0}.{1}")]
    UnsupportedVersion(u8, u8),
    #[error("Malformed .npy header: {0}")]
    BadHeader(String),
    #[error("Unsupported dtype {0}")]
    UnsupportedDtype(String),
    #[error("Fortran-ordered arrays are not supported")]
    FortranOrder,
    #[error("Expected {expected} payload bytes, found {found}")]
    Truncated { expected: usize, found: usize },
}

pub fn write_f32(path: &Path, array: ArrayViewD<'_, f32>) -> Result<(), NpyError> {
    fs::write(path, encode_f32(array)).map_err(|source| NpyError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn read_f32(path: &Path) -> Result<ArrayD<f32>, NpyError> {
    let bytes = fs::read(path).map_err(|source| NpyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode_f32(&bytes)
}

pub fn encode_f32(array: ArrayViewD<'_, f32>) -> Vec<u8> {
    let shape = match array.shape() {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => format!(
            "({})",
            dims.iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': {shape}, }}");

    // magic(6) + version(2) + length(2) + header + '\n' must be 64-aligned
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + array.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for value in array.iter() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_f32(bytes: &[u8]) -> Result<ArrayD<f32>, NpyError> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(NpyError::BadMagic);
    }
    let (major, minor) = (bytes[6], bytes[7]);
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(NpyError::BadHeader("truncated length field".into()));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        _ => return Err(NpyError::UnsupportedVersion(major, minor)),
    };

    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .ok_or_else(|| NpyError::BadHeader("header runs past end of file".into()))?;
    let header = std::str::from_utf8(header)
        .map_err(|_| NpyError::BadHeader("header is not text".into()))?;

    let descr = quoted_value(header, "descr")?;
    if raw_value(header, "fortran_order")?.starts_with("True") {
        return Err(NpyError::FortranOrder);
    }
    let shape = parse_shape(header)?;
    let count: usize = shape.iter().product();

    let payload = &bytes[data_start..];
    let values = match descr {
        "<f4" => {
            check_len(payload, count * 4)?;
            payload
                .chunks_exact(4)
                .take(count)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        }
        "<f8" => {
            check_len(payload, count * 8)?;
            payload
                .chunks_exact(8)
                .take(count)
                .map(|c| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(c);
                    f64::from_le_bytes(b) as f32
                })
                .collect()
        }
        other => return Err(NpyError::UnsupportedDtype(other.to_string())),
    };

    ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| NpyError::BadHeader(format!("shape mismatch: {e}")))
}

fn check_len(payload: &[u8], expected: usize) -> Result<(), NpyError> {
    if payload.len() < expected {
        return Err(NpyError::Truncated {
            expected,
            found: payload.len(),
        });
    }
    Ok(())
}

/// Text following `'key':`, with leading whitespace removed.
fn raw_value<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let needle = format!("'{key}':");
    let start = header
        .find(&needle)
        .ok_or_else(|| NpyError::BadHeader(format!("missing '{key}'")))?;
    Ok(header[start + needle.len()..].trim_start())
}

fn quoted_value<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let rest = raw_value(header, key)?;
    let rest = rest
        .strip_prefix('\'')
        .ok_or_else(|| NpyError::BadHeader(format!("'{key}' is not a string")))?;
    let end = rest
        .find('\'')
        .ok_or_else(|| NpyError::BadHeader(format!("unterminated '{key}'")))?;
    Ok(&rest[..end])
}

fn parse_shape(header: &str) -> Result<Vec<usize>, NpyError> {
    let rest = raw_value(header, "shape")?;
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.find(')').map(|end| &r[..end]))
        .ok_or_else(|| NpyError::BadHeader("shape is not a tuple".into()))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| {
            d.parse::<usize>()
                .map_err(|_| NpyError::BadHeader(format!("bad dimension '{d}'")))
        })
        .collect()
}
