// Document I/O

pub mod json;
pub mod lines;

use std::io::Read;
use std::path::{Path, PathBuf};

use livecalc_engine::CellRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record {record}: {message}")]
    Format { record: u64, message: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IoError {
    pub(crate) fn file(path: &Path, source: std::io::Error) -> Self {
        IoError::File {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for malformed content, false for filesystem failures.
    pub fn is_format_error(&self) -> bool {
        !matches!(self, IoError::File { .. })
    }
}

/// On-disk document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One `;`-delimited record per line.
    Lines,
    /// Pretty-printed JSON array of records.
    Json,
}

impl Format {
    /// `.json` files are JSON; everything else is lines.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Lines,
        }
    }
}

/// Load a document, choosing the format from the extension.
pub fn load(path: &Path) -> Result<Vec<CellRecord>, IoError> {
    let records = match Format::from_path(path) {
        Format::Json => json::read(path)?,
        Format::Lines => lines::read(path)?,
    };
    log::debug!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Save a document, choosing the format from the extension.
pub fn save(path: &Path, records: &[CellRecord]) -> Result<(), IoError> {
    match Format::from_path(path) {
        Format::Json => json::write(path, records)?,
        Format::Lines => lines::write(path, records)?,
    }
    log::debug!("saved {} records to {}", records.len(), path.display());
    Ok(())
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path).map_err(|e| IoError::file(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| IoError::file(path, e))?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}
