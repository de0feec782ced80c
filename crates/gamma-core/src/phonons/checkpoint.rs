//! Append-only triplet log, one file per process.
//!
//! Each line is `<bra> <kp_mode> <kpp_mode> <rate> <dirac>` with the two
//! floats in `{:.8e}` form. Records of one bra mode are appended with one
//! `write_all`, so a torn final line marks that whole bra mode as unfinished.
//! `write_all` is not atomic: a crash that stops a mode exactly on a line
//! boundary leaves a clean prefix, and resume then starts after that mode
//! without recomputing its missing triplets.

use super::serialization::format_scientific_f64;
use crate::domain::{GammaError, ProcessKind};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const LOG_STEM: &str = "scattering_matrix";
const FLOAT_DIGITS: usize = 8;

pub fn log_path(folder: &Path, process: ProcessKind) -> PathBuf {
    folder.join(format!("{LOG_STEM}{}", process.log_suffix()))
}

/// Rounds through the on-disk text form so replayed and fresh values agree.
pub fn quantize(value: f64) -> f64 {
    format_scientific_f64(value, FLOAT_DIGITS)
        .parse()
        .unwrap_or(value)
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("failed to {action} checkpoint '{}': {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint '{}' line {line_number} is malformed ({reason}): '{line}'", .path.display())]
    MalformedLine {
        path: PathBuf,
        line_number: usize,
        line: String,
        reason: String,
    },
}

impl From<CheckpointError> for GammaError {
    fn from(error: CheckpointError) -> Self {
        match error {
            CheckpointError::Io { .. } => GammaError::io_system("IO.CHECKPOINT", error.to_string()),
            CheckpointError::MalformedLine { .. } => {
                GammaError::computation("RUN.CHECKPOINT_MALFORMED", error.to_string())
            }
        }
    }
}

/// Flat mode indices plus the two per-triplet scalars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripletRecord {
    pub bra: usize,
    pub kp_mode: usize,
    pub kpp_mode: usize,
    pub rate: f64,
    pub dirac: f64,
}

impl TripletRecord {
    /// A record whose floats already carry log precision.
    pub fn quantized(bra: usize, kp_mode: usize, kpp_mode: usize, rate: f64, dirac: f64) -> Self {
        Self {
            bra,
            kp_mode,
            kpp_mode,
            rate: quantize(rate),
            dirac: quantize(dirac),
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.bra,
            self.kp_mode,
            self.kpp_mode,
            format_scientific_f64(self.rate, FLOAT_DIGITS),
            format_scientific_f64(self.dirac, FLOAT_DIGITS)
        )
    }

    pub fn parse_line(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!("expected 5 fields, found {}", fields.len()));
        }
        let index = |position: usize| {
            fields[position]
                .parse::<usize>()
                .map_err(|error| format!("field {} '{}': {error}", position + 1, fields[position]))
        };
        let float = |position: usize| {
            fields[position]
                .parse::<f64>()
                .map_err(|error| format!("field {} '{}': {error}", position + 1, fields[position]))
        };
        Ok(Self {
            bra: index(0)?,
            kp_mode: index(1)?,
            kpp_mode: index(2)?,
            rate: float(3)?,
            dirac: float(4)?,
        })
    }
}

/// Log state reconstructed from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointReplay {
    pub records: Vec<TripletRecord>,
    /// Byte length of the retained prefix.
    pub valid_len: u64,
    pub file_len: u64,
    /// Records dropped with a torn tail, excluding the torn line itself.
    pub discarded_records: usize,
    pub has_torn_tail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointSummary {
    pub records: usize,
    pub last_bra: Option<usize>,
    pub resume_mode: usize,
    pub discarded_records: usize,
    pub has_torn_tail: bool,
}

impl CheckpointReplay {
    pub fn last_bra(&self) -> Option<usize> {
        self.records.last().map(|record| record.bra)
    }

    /// First bra mode that still has to be computed.
    pub fn resume_mode(&self) -> usize {
        self.last_bra().map_or(0, |bra| bra + 1)
    }

    pub fn needs_truncation(&self) -> bool {
        self.valid_len < self.file_len
    }

    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary {
            records: self.records.len(),
            last_bra: self.last_bra(),
            resume_mode: self.resume_mode(),
            discarded_records: self.discarded_records,
            has_torn_tail: self.has_torn_tail,
        }
    }
}

/// `Ok(None)` when the log does not exist.
pub fn replay_log(path: &Path) -> Result<Option<CheckpointReplay>, CheckpointError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CheckpointError::Io {
                action: "read",
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut records = Vec::new();
    // byte offset where each retained record starts
    let mut starts = Vec::new();
    let mut has_torn_tail = false;
    let mut offset = 0;
    let mut line_number = 0;

    while offset < bytes.len() {
        line_number += 1;
        let (end, next, terminated) = match bytes[offset..].iter().position(|byte| *byte == b'\n') {
            Some(position) => (offset + position, offset + position + 1, true),
            None => (bytes.len(), bytes.len(), false),
        };
        let is_last = next >= bytes.len();
        let parsed = std::str::from_utf8(&bytes[offset..end])
            .map_err(|error| format!("invalid utf-8: {error}"))
            .and_then(TripletRecord::parse_line);

        match parsed {
            Ok(record) if terminated => {
                records.push(record);
                starts.push(offset as u64);
            }
            Ok(_) => has_torn_tail = true,
            Err(_) if is_last => has_torn_tail = true,
            Err(reason) => {
                return Err(CheckpointError::MalformedLine {
                    path: path.to_path_buf(),
                    line_number,
                    line: String::from_utf8_lossy(&bytes[offset..end]).into_owned(),
                    reason,
                });
            }
        }
        offset = next;
    }

    let mut valid_len = bytes.len() as u64;
    let mut discarded_records = 0;
    if has_torn_tail {
        // the bra mode being written when the log was torn is incomplete
        let keep = match records.last() {
            Some(last) => {
                let bra = last.bra;
                records.len()
                    - records
                        .iter()
                        .rev()
                        .take_while(|record| record.bra == bra)
                        .count()
            }
            None => 0,
        };
        discarded_records = records.len() - keep;
        valid_len = starts.get(keep).copied().unwrap_or(0);
        records.truncate(keep);
    }

    Ok(Some(CheckpointReplay {
        records,
        valid_len,
        file_len: bytes.len() as u64,
        discarded_records,
        has_torn_tail,
    }))
}

/// Appends whole bra modes to a log.
#[derive(Debug)]
pub struct CheckpointWriter {
    file: File,
    path: PathBuf,
    written_records: usize,
}

impl CheckpointWriter {
    /// Opens for append, first cutting the file to `truncate_to` bytes if given.
    pub fn open(path: &Path, truncate_to: Option<u64>) -> Result<Self, CheckpointError> {
        let io_error = |action: &'static str| {
            move |source| CheckpointError::Io {
                action,
                path: path.to_path_buf(),
                source,
            }
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error("create folder for"))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_error("open"))?;
        if let Some(len) = truncate_to {
            file.set_len(len).map_err(io_error("truncate"))?;
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
            written_records: 0,
        })
    }

    pub fn written_records(&self) -> usize {
        self.written_records
    }

    /// Writes every record of one bra mode and flushes.
    pub fn append_mode(&mut self, records: &[TripletRecord]) -> Result<(), CheckpointError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut batch = String::with_capacity(records.len() * 48);
        for record in records {
            batch.push_str(&record.to_line());
            batch.push('\n');
        }
        self.file
            .write_all(batch.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| CheckpointError::Io {
                action: "append to",
                path: self.path.clone(),
                source,
            })?;
        self.written_records += records.len();
        Ok(())
    }

    pub fn finish(self) -> Result<usize, CheckpointError> {
        self.file.sync_all().map_err(|source| CheckpointError::Io {
            action: "sync",
            path: self.path.clone(),
            source,
        })?;
        Ok(self.written_records)
    }
}
