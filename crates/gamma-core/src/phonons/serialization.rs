use faer::Mat;
use std::fs;
use std::path::Path;

/// Leading bytes of every persisted `f64` array.
pub const ARRAY_MAGIC: &[u8; 8] = b"GAMMAF64";
const HEADER_LEN: usize = ARRAY_MAGIC.len() + 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArrayCodecError {
    #[error("array header is truncated ({len} bytes)")]
    TruncatedHeader { len: usize },
    #[error("array magic mismatch")]
    BadMagic,
    #[error("array payload holds {actual} bytes, expected {expected} for {rows}x{cols}")]
    PayloadLength {
        rows: usize,
        cols: usize,
        expected: usize,
        actual: usize,
    },
}

/// `{value:.precision$e}`, the scientific form used by checkpoint lines.
pub fn format_scientific_f64(value: f64, precision: usize) -> String {
    format!("{value:.precision$e}", precision = precision)
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    create_parent_dir(path)?;
    fs::write(path, normalize_text_artifact(content))
}

pub fn write_binary_artifact(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    create_parent_dir(path)?;
    fs::write(path, bytes)
}

fn create_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Magic, `u64` LE rows, `u64` LE cols, then row-major `f64` LE values.
pub fn encode_f64_matrix(matrix: &Mat<f64>) -> Vec<u8> {
    let rows = matrix.nrows();
    let cols = matrix.ncols();
    let mut bytes = Vec::with_capacity(HEADER_LEN + rows * cols * 8);
    bytes.extend_from_slice(ARRAY_MAGIC);
    bytes.extend_from_slice(&(rows as u64).to_le_bytes());
    bytes.extend_from_slice(&(cols as u64).to_le_bytes());
    for row in 0..rows {
        for col in 0..cols {
            bytes.extend_from_slice(&matrix[(row, col)].to_le_bytes());
        }
    }
    bytes
}

pub fn decode_f64_matrix(bytes: &[u8]) -> Result<Mat<f64>, ArrayCodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(ArrayCodecError::TruncatedHeader { len: bytes.len() });
    }
    if &bytes[..ARRAY_MAGIC.len()] != ARRAY_MAGIC {
        return Err(ArrayCodecError::BadMagic);
    }

    let rows = read_u64(&bytes[8..16]) as usize;
    let cols = read_u64(&bytes[16..24]) as usize;
    let payload = &bytes[HEADER_LEN..];
    let expected = rows.saturating_mul(cols).saturating_mul(8);
    if payload.len() != expected {
        return Err(ArrayCodecError::PayloadLength {
            rows,
            cols,
            expected,
            actual: payload.len(),
        });
    }

    let mut matrix = Mat::<f64>::zeros(rows, cols);
    for (index, chunk) in payload.chunks_exact(8).enumerate() {
        let mut raw = [0_u8; 8];
        raw.copy_from_slice(chunk);
        matrix[(index / cols, index % cols)] = f64::from_le_bytes(raw);
    }
    Ok(matrix)
}

fn read_u64(slice: &[u8]) -> u64 {
    let mut raw = [0_u8; 8];
    raw.copy_from_slice(slice);
    u64::from_le_bytes(raw)
}
